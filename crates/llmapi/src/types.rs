use crate::utils;
use reqwest::Client;
use serde::Serialize;

#[derive(Clone, Debug)]
pub enum LLMMessageType {
    TEXT(String),
    IMAGE {
        data_b64: String,
        file_path: Option<String>,
    },
}
impl LLMMessageType {
    pub fn text(text: impl Into<String>) -> Self {
        LLMMessageType::TEXT(text.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LLMUserType {
    Human,
    AI,
    System,
}
impl LLMUserType {
    pub fn from_str(role_str: &str) -> Option<Self> {
        match role_str.trim().to_lowercase().as_str() {
            "user" | "human" => Some(LLMUserType::Human),
            "model" | "ai" | "assistant" => Some(LLMUserType::AI),
            "system" => Some(LLMUserType::System),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LLMMessage {
    pub id: String,
    pub role: LLMUserType,
    pub content: Vec<LLMMessageType>,
    pub created_at: i64,
}

impl LLMMessage {
    pub fn new(id: Option<String>, role: &str, content: Vec<LLMMessageType>) -> Self {
        let id = id.unwrap_or_else(|| utils::current_timestamp_millis().to_string());
        Self {
            id,
            role: LLMUserType::from_str(role).unwrap_or(LLMUserType::Human),
            content,
            created_at: utils::current_timestamp_millis() as i64,
        }
    }
}

/// The harm categories relaxed for image edits. Image-specific categories
/// are rejected by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmCategory {
    HarmCategorySexuallyExplicit,
    HarmCategoryHarassment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Tuning knobs sent as `generationConfig` next to the contents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub response_modalities: Vec<String>,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerationOptions {
    /// Options for an image-only response with the permissive safety
    /// settings the image models need for portrait edits.
    pub fn image_only() -> Self {
        Self {
            response_modalities: vec!["IMAGE".to_string()],
            safety_settings: vec![
                SafetySetting {
                    category: HarmCategory::HarmCategorySexuallyExplicit,
                    threshold: HarmBlockThreshold::BlockNone,
                },
                SafetySetting {
                    category: HarmCategory::HarmCategoryHarassment,
                    threshold: HarmBlockThreshold::BlockNone,
                },
            ],
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct LLMClient {
    pub(crate) api_key: String,
    pub(crate) endpoint: String,
    pub(crate) default_model: String,
    pub(crate) http: Client,
}

impl LLMClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        let default_model = default_model.into();
        let default_model = default_model
            .strip_prefix("models/")
            .unwrap_or(&default_model)
            .to_string();

        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            default_model,
            http: Client::new(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}

impl std::fmt::Debug for LLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMClient")
            .field("endpoint", &self.endpoint)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}
