pub mod api_log;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod fs_utils;
pub mod models;
pub mod path_spec_builder;

pub use api_log::ApiCallLog;
pub use commands::confirm::confirm_to_continue;
pub use commands::generate::{BatchSummary, ContentBackend, GeminiImageGenerator, ImageGenerator};
pub use commands::run::{
    list_available_models, prepare_run, run_generation, PreparedRun, RunOptions, RunOutcome,
};
pub use config::{GeminiConfig, GlobalConfig, InputOutputSpecConfig, PromptConfig, PromptEntry};
pub use error::{ConfigError, ItemError, PathSpecError};
pub use models::{GenerationContentConfig, GenerationLogEntry, PathSpec, PathSpecItem};
pub use path_spec_builder::{
    build_for_pair_of_directories, build_for_single_directory, build_path_spec,
};
