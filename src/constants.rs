pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

pub const DEFAULT_GLOBAL_CONFIG_PATH: &str = "config/global_config.yaml";
pub const DEFAULT_PROMPT_CONFIG_PATH: &str = "config/prompt_config.yaml";
pub const DEFAULT_PROMPT_KEY: &str = "default";
pub const PLACEHOLDER_API_KEY: &str = "YOUR GEMINI API KEY";

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "avif"];
pub const OUTPUT_IMAGE_EXTENSION: &str = "png";
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
pub const APPLIED_TO_SEPARATOR: &str = "-applied-to-";
pub const TRANSFERRED_FROM_SEPARATOR: &str = "-transferred-from-";
pub const CANDIDATE_MARKER: &str = "candidate";

pub const DEFAULT_REQUEST_INTERVAL_SECS: u64 = 8;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 32768;

pub const API_CALL_LOG_FILE: &str = "gemini_api_call.log";
pub const API_CALL_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
