use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use crate::types::{GenerationOptions, LLMClient, LLMMessage, LLMMessageType, LLMUserType};
use crate::utils::detect_mime_type;

use super::models::{GeminiResponse, ListModelsResponse, ModelInfo};

const LIST_MODELS_PAGE_SIZE: u32 = 32;

/// Non-success HTTP status from the Gemini API, kept typed so callers can
/// tell a rejected request (4xx) from a service fault (5xx).
#[derive(Debug, Clone)]
pub struct StatusError {
    pub status: u16,
    pub body: String,
}

impl StatusError {
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gemini returned status {}: {}", self.status, self.body)
    }
}

impl std::error::Error for StatusError {}

pub fn convert_body_parts_gemini(body_part: Vec<LLMMessageType>) -> Vec<Value> {
    body_part
        .into_iter()
        .map(|part| match part {
            LLMMessageType::TEXT(text) => json!({ "text": text }),
            LLMMessageType::IMAGE {
                data_b64,
                file_path,
            } => {
                let mime = file_path
                    .as_ref()
                    .map(detect_mime_type)
                    .unwrap_or_else(|| "image/jpeg".into());
                json!({
                    "inlineData": {
                        "mimeType": mime,
                        "data": data_b64
                    }
                })
            }
        })
        .collect()
}

pub fn convert_messages_to_gemini_contents(messages: Vec<LLMMessage>) -> Vec<Value> {
    messages
        .into_iter()
        .map(|m| {
            let role = role_to_str(m.role);
            let parts = convert_body_parts_gemini(m.content);
            json!({
                "role": role,
                "parts": parts
            })
        })
        .collect()
}

fn role_to_str(role: LLMUserType) -> &'static str {
    match role {
        LLMUserType::Human => "user",
        LLMUserType::AI => "model",
        LLMUserType::System => "system",
    }
}

fn convert_generation_options(options: &GenerationOptions) -> Map<String, Value> {
    let mut config = Map::new();
    if let Some(temperature) = options.temperature {
        config.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = options.top_p {
        config.insert("topP".into(), json!(top_p));
    }
    if let Some(max_output_tokens) = options.max_output_tokens {
        config.insert("maxOutputTokens".into(), json!(max_output_tokens));
    }
    if !options.response_modalities.is_empty() {
        config.insert(
            "responseModalities".into(),
            json!(options.response_modalities),
        );
    }
    config
}

pub fn build_generate_body(messages: Vec<LLMMessage>, options: &GenerationOptions) -> Value {
    let mut body = json!({
        "contents": convert_messages_to_gemini_contents(messages)
    });

    let generation_config = convert_generation_options(options);
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    if !options.safety_settings.is_empty() {
        body["safetySettings"] = json!(options.safety_settings);
    }

    body
}

pub async fn send_generate_request(
    api_client: &LLMClient,
    body_part: Vec<LLMMessage>,
    options: &GenerationOptions,
) -> Result<GeminiResponse> {
    let endpoint = api_client.endpoint().trim_end_matches('/');
    let url = format!(
        "{}/{}:generateContent",
        endpoint,
        api_client.default_model()
    );

    let body = build_generate_body(body_part, options);

    let response = api_client
        .http()
        .post(url)
        .header("x-goog-api-key", api_client.api_key())
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .context("HTTP request failed")?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .context("Reading response body failed")?;

    if !status.is_success() {
        return Err(StatusError {
            status: status.as_u16(),
            body: response_text,
        }
        .into());
    }

    parse_generate_response(&response_text)
}

pub fn parse_generate_response(response_text: &str) -> Result<GeminiResponse> {
    serde_json::from_str(response_text).with_context(|| {
        format!(
            "Failed to decode Gemini response JSON. Raw response: {}",
            response_text
        )
    })
}

pub async fn list_models(api_client: &LLMClient) -> Result<Vec<ModelInfo>> {
    let url = api_client.endpoint().trim_end_matches('/').to_string();
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut query = vec![("pageSize", LIST_MODELS_PAGE_SIZE.to_string())];
        if let Some(token) = &page_token {
            query.push(("pageToken", token.clone()));
        }

        let response = api_client
            .http()
            .get(&url)
            .header("x-goog-api-key", api_client.api_key())
            .query(&query)
            .send()
            .await
            .context("HTTP request (models.list) failed")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Reading models.list response body failed")?;

        if !status.is_success() {
            return Err(StatusError {
                status: status.as_u16(),
                body: response_text,
            }
            .into());
        }

        let page: ListModelsResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to decode models.list JSON. Raw: {}", response_text))?;

        models.extend(page.models);

        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(models)
}

pub fn response_to_text_data(response: &GeminiResponse) -> Result<String> {
    //get only 1 text response
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| anyhow::anyhow!("No candidates found"))?;

    let mut full_text = String::new();
    if let Some(content) = &candidate.content {
        for part in &content.parts {
            if let Some(text) = &part.text {
                full_text.push_str(text);
            }
        }
    }
    Ok(full_text)
}
