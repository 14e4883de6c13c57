pub mod gemini;

pub use gemini::{StatusError, list_models, send_generate_request};
