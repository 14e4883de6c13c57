pub mod providers;
pub mod types;
pub mod utils;

pub use providers::{StatusError, list_models, send_generate_request};
pub use types::{
    GenerationOptions, HarmBlockThreshold, HarmCategory, LLMClient, LLMMessage, LLMMessageType,
    SafetySetting,
};
