use std::path::PathBuf;

/// Problems found while loading or validating the YAML configuration. All of
/// them are fatal and surface before any request is sent.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Unknown input/output spec type '{0}', expected 'pair_of_directories' or 'single_directory'")]
    UnknownSpecType(String),

    #[error("Gemini API key is still the placeholder value; set gemini.api_key or GEMINI_API_KEY")]
    PlaceholderApiKey,

    #[error("Prompt config has no entry named '{0}'")]
    MissingPrompt(String),

    #[error("Prompt '{0}' is empty")]
    EmptyPrompt(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PathSpecError {
    #[error("Input file path list cannot be empty")]
    EmptyInputList,

    #[error("Output file path list cannot be empty")]
    EmptyOutputList,
}

/// Why a single path spec item produced no image. These are logged and
/// counted; the batch moves on to the next item.
#[derive(thiserror::Error, Debug)]
pub enum ItemError {
    #[error("Failed to open image at '{}': {reason}", path.display())]
    InputImage { path: PathBuf, reason: String },

    #[error("Gemini server error: {0}")]
    ServerError(String),

    #[error("Gemini API error: {0}")]
    ClientError(String),

    #[error("Failed to request image generation: {0}")]
    Request(String),

    #[error("No candidates in the response")]
    NoCandidates,

    #[error("No candidate carried an image payload")]
    NoImageSaved,

    #[error("Failed to decode generated image: {0}")]
    Decode(String),

    #[error("Unable to persist generated image to '{}': {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

impl From<anyhow::Error> for ItemError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<llmapi::StatusError>() {
            Some(status) if status.is_server_error() => ItemError::ServerError(status.to_string()),
            Some(status) if status.is_client_error() => ItemError::ClientError(status.to_string()),
            _ => ItemError::Request(format!("{err:#}")),
        }
    }
}
