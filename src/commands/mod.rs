pub mod confirm;
pub mod generate;
pub mod run;
