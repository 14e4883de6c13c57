use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine;
use llmapi::providers::gemini::models::GeminiResponse;
use llmapi::providers::gemini::{response_to_text_data, send_generate_request};
use llmapi::{GenerationOptions, LLMClient, LLMMessage, LLMMessageType};
use log::{error, info, warn};

use crate::api_log::ApiCallLog;
use crate::config::GeminiConfig;
use crate::constants::{DEFAULT_IMAGE_MIME, DEFAULT_REQUEST_INTERVAL_SECS};
use crate::error::ItemError;
use crate::fs_utils::{
    candidate_output_paths, default_extension_for_mime, load_input_image, write_output_image,
    InputImage,
};
use crate::models::{GenerationContentConfig, GenerationLogEntry, PathSpec, PathSpecItem};

/// The remote call behind a generator: one request in, one response out.
#[allow(async_fn_in_trait)]
pub trait ContentBackend {
    fn model(&self) -> &str;

    async fn generate_content(
        &self,
        messages: Vec<LLMMessage>,
        options: &GenerationOptions,
    ) -> anyhow::Result<GeminiResponse>;
}

impl ContentBackend for LLMClient {
    fn model(&self) -> &str {
        self.default_model()
    }

    async fn generate_content(
        &self,
        messages: Vec<LLMMessage>,
        options: &GenerationOptions,
    ) -> anyhow::Result<GeminiResponse> {
        send_generate_request(self, messages, options).await
    }
}

/// One implementation per image provider.
#[allow(async_fn_in_trait)]
pub trait ImageGenerator {
    /// Runs every item of `spec` in order. Item failures are logged and
    /// counted; the result is `false` only if the generator could not run.
    async fn generate_batch(&self, spec: &PathSpec, config: &GenerationContentConfig) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
}

pub struct GeminiImageGenerator<B = LLMClient> {
    client: Option<B>,
    api_call_log: ApiCallLog,
    request_interval: Duration,
}

impl<B> GeminiImageGenerator<B> {
    pub fn new(api_call_log: ApiCallLog) -> Self {
        Self {
            client: None,
            api_call_log,
            request_interval: Duration::from_secs(DEFAULT_REQUEST_INTERVAL_SECS),
        }
    }

    pub fn with_backend(backend: B, api_call_log: ApiCallLog) -> Self {
        Self {
            client: Some(backend),
            ..Self::new(api_call_log)
        }
    }

    pub fn with_request_interval(mut self, request_interval: Duration) -> Self {
        self.request_interval = request_interval;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    pub fn backend(&self) -> Option<&B> {
        self.client.as_ref()
    }
}

impl GeminiImageGenerator<LLMClient> {
    /// Creates the API client once. Without an API key the generator stays
    /// uninitialized and every batch is refused.
    pub fn initialize(&mut self, gemini_config: Option<&GeminiConfig>) -> bool {
        if self.client.is_some() {
            return true;
        }

        let Some(gemini_config) = gemini_config else {
            error!("Gemini configuration is missing.");
            return false;
        };

        let Some(api_key) = gemini_config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            error!("Gemini API key is missing in the configuration.");
            return false;
        };

        self.client = Some(LLMClient::new(
            api_key,
            gemini_config.endpoint.as_str(),
            gemini_config.model.as_str(),
        ));
        true
    }
}

impl<B: ContentBackend> ImageGenerator for GeminiImageGenerator<B> {
    async fn generate_batch(&self, spec: &PathSpec, config: &GenerationContentConfig) -> bool {
        self.run_batch(spec, config).await.is_some()
    }
}

impl<B: ContentBackend> GeminiImageGenerator<B> {
    pub async fn run_batch(
        &self,
        spec: &PathSpec,
        config: &GenerationContentConfig,
    ) -> Option<BatchSummary> {
        let Some(client) = self.client.as_ref() else {
            error!("Gemini client is not initialized.");
            return None;
        };

        let requested = spec.len();
        let mut summary = BatchSummary::default();

        for (index, item) in spec.items().iter().enumerate() {
            let result = self.generate_item(client, item, config).await;
            summary.total += 1;
            match result {
                Ok(saved) => {
                    info!("Image generation succeeded, {saved} image(s) saved");
                    summary.success += 1;
                }
                Err(err) => {
                    error!("Image generation failed for {:?}: {err}", item.input_file_path_list());
                    summary.failure += 1;
                }
            }

            info!(
                "Among: {requested} So far... total requests: {}, Success: {}, Failure: {}",
                summary.total, summary.success, summary.failure
            );

            if index + 1 < requested && !self.request_interval.is_zero() {
                info!(
                    "Waiting for {} seconds to avoid hitting rate limits...",
                    self.request_interval.as_secs_f32()
                );
                tokio::time::sleep(self.request_interval).await;
            }
        }

        Some(summary)
    }

    async fn generate_item(
        &self,
        client: &B,
        item: &PathSpecItem,
        config: &GenerationContentConfig,
    ) -> Result<usize, ItemError> {
        let mut input_images = Vec::with_capacity(item.input_file_path_list().len());
        for path in item.input_file_path_list() {
            input_images.push(load_input_image(path).await?);
        }

        let messages = vec![LLMMessage::new(
            None,
            "Human",
            build_user_content(config.prompt(), &input_images),
        )];
        let options = GenerationOptions {
            temperature: Some(config.effective_temperature()),
            top_p: Some(config.effective_top_p()),
            max_output_tokens: Some(config.effective_max_output_tokens()),
            ..GenerationOptions::image_only()
        };

        info!("Calling Gemini API...");
        let response = client.generate_content(messages, &options).await?;
        info!("Done.");
        show_response_info(&response);

        if response.candidates.is_empty() {
            if let Some(reason) = response
                .prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.as_deref())
            {
                warn!("Prompt was blocked: {reason}");
            }
            return Err(ItemError::NoCandidates);
        }

        let mut count_saved = 0;
        for (index, candidate) in response.candidates.iter().enumerate() {
            let Some(content) = candidate.content.as_ref() else {
                error!("Candidate {index} has no content.");
                continue;
            };
            if content.parts.is_empty() {
                error!("Candidate {index} has no content parts.");
                continue;
            }

            let output_paths = candidate_output_paths(item.output_file_path_list(), index);
            for inline_data in content
                .parts
                .iter()
                .filter_map(|part| part.inline_data.as_ref())
            {
                info!("Saving image...");
                let bytes = BASE64_ENGINE
                    .decode(inline_data.data.trim())
                    .map_err(|err| ItemError::Decode(err.to_string()))?;
                write_output_image(&bytes, &output_paths).await?;
                info!("Saved to {output_paths:?}");

                self.log_api_call(client.model(), config, item, &output_paths)
                    .await;
                count_saved += 1;
            }
        }

        if count_saved == 0 {
            return Err(ItemError::NoImageSaved);
        }
        Ok(count_saved)
    }

    async fn log_api_call(
        &self,
        model: &str,
        config: &GenerationContentConfig,
        item: &PathSpecItem,
        output_paths: &[PathBuf],
    ) {
        let entry = GenerationLogEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            model: model.to_string(),
            prompt: config.prompt().trim().to_string(),
            input_paths: display_paths(item.input_file_path_list()),
            output_paths: display_paths(output_paths),
            temperature: config.effective_temperature(),
            top_p: config.effective_top_p(),
        };

        if let Err(err) = self.api_call_log.append(&entry).await {
            warn!(
                "Failed to append to API call log '{}': {err}",
                self.api_call_log.path().display()
            );
        }
    }
}

/// Prompt first, then each image inline. The pseudo file name only carries
/// the sniffed MIME type to the wire layer.
fn build_user_content(prompt: &str, input_images: &[InputImage]) -> Vec<LLMMessageType> {
    let mut user_content = vec![LLMMessageType::text(prompt.to_string())];

    for (index, image) in input_images.iter().enumerate() {
        let mime_type = if image.mime_type.trim().is_empty() {
            DEFAULT_IMAGE_MIME
        } else {
            image.mime_type.as_str()
        };
        let extension = default_extension_for_mime(mime_type).unwrap_or_else(|| "bin".to_string());

        user_content.push(LLMMessageType::IMAGE {
            data_b64: BASE64_ENGINE.encode(&image.bytes),
            file_path: Some(format!("reference_{index}.{extension}")),
        });
    }

    user_content
}

fn show_response_info(response: &GeminiResponse) {
    info!("Response candidates count: {}", response.candidates.len());
    for (i, candidate) in response.candidates.iter().enumerate() {
        let finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        let Some(content) = candidate.content.as_ref() else {
            warn!("Candidate {i} has no content (finish reason: {finish_reason})");
            continue;
        };

        info!("Candidate {i} finish reason: {finish_reason}");

        info!("Candidate {i} content parts count: {}", content.parts.len());
        for (j, part) in content.parts.iter().enumerate() {
            if let Some(text) = &part.text {
                info!("Candidate {i} Part {j} is text with length {}", text.len());
            } else if let Some(inline_data) = &part.inline_data {
                info!(
                    "Candidate {i} Part {j} is inline data with mime_type {} and data length {}",
                    inline_data.mime_type,
                    inline_data.data.len()
                );
            } else if let Some(file_data) = &part.file_data {
                info!("Candidate {i} Part {j} is uri: {}", file_data.file_uri);
            } else {
                info!("Candidate {i} Part {j} is unknown type");
            }
        }
    }

    if let Some(usage) = &response.usage_metadata {
        info!(
            "Token usage: prompt {}, candidates {}, total {}",
            usage.prompt_token_count.unwrap_or(0),
            usage.candidates_token_count.unwrap_or(0),
            usage.total_token_count.unwrap_or(0)
        );
    }

    if let Ok(text) = response_to_text_data(response) {
        if !text.trim().is_empty() {
            info!("Model text: {}", text.trim());
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::path::Path;

    use llmapi::providers::gemini::models::{Candidate, Content, InlineData, Part};
    use llmapi::StatusError;

    struct FakeBackend {
        responses: RefCell<VecDeque<anyhow::Result<GeminiResponse>>>,
        requests: RefCell<Vec<Vec<LLMMessage>>>,
    }

    impl FakeBackend {
        fn new(responses: Vec<anyhow::Result<GeminiResponse>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ContentBackend for FakeBackend {
        fn model(&self) -> &str {
            "fake-image-model"
        }

        async fn generate_content(
            &self,
            messages: Vec<LLMMessage>,
            _options: &GenerationOptions,
        ) -> anyhow::Result<GeminiResponse> {
            self.requests.borrow_mut().push(messages);
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 120, 240]));
        let mut cursor = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn image_candidate(text: Option<&str>) -> Candidate {
        let mut parts = Vec::new();
        if let Some(text) = text {
            parts.push(Part {
                text: Some(text.to_string()),
                ..Part::default()
            });
        }
        parts.push(Part {
            inline_data: Some(InlineData {
                mime_type: "image/png".into(),
                data: BASE64_ENGINE.encode(png_bytes()),
            }),
            ..Part::default()
        });
        Candidate {
            content: Some(Content { parts, role: None }),
            ..Candidate::default()
        }
    }

    fn response(candidates: Vec<Candidate>) -> GeminiResponse {
        GeminiResponse {
            candidates,
            ..GeminiResponse::default()
        }
    }

    fn write_inputs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, png_bytes()).unwrap();
                path
            })
            .collect()
    }

    fn generator(
        backend: FakeBackend,
        dir: &Path,
    ) -> GeminiImageGenerator<FakeBackend> {
        GeminiImageGenerator::with_backend(backend, ApiCallLog::new(dir.join("calls.log")))
            .with_request_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn uninitialized_generator_refuses_batch() {
        let dir = tempfile::tempdir().unwrap();
        let generator: GeminiImageGenerator<FakeBackend> =
            GeminiImageGenerator::new(ApiCallLog::new(dir.path().join("calls.log")));
        let config = GenerationContentConfig::new("prompt");

        assert!(!generator.is_initialized());
        assert!(!generator.generate_batch(&PathSpec::new(), &config).await);
    }

    #[test]
    fn initialize_requires_api_key() {
        let mut generator: GeminiImageGenerator =
            GeminiImageGenerator::new(ApiCallLog::new("unused.log"));
        assert!(!generator.initialize(None));
        assert!(!generator.initialize(Some(&GeminiConfig::default())));
        assert!(!generator.is_initialized());

        let config = GeminiConfig {
            api_key: Some("real-key".into()),
            ..GeminiConfig::default()
        };
        assert!(generator.initialize(Some(&config)));
        assert!(generator.is_initialized());
    }

    #[tokio::test]
    async fn every_candidate_gets_its_own_output_paths() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["source.png", "reference.png"]);
        let outputs = vec![dir.path().join("applied.png"), dir.path().join("transferred.png")];
        let mut spec = PathSpec::new();
        spec.add_item_with_lists(inputs.clone(), outputs.clone()).unwrap();

        let backend = FakeBackend::new(vec![Ok(response(vec![
            image_candidate(Some("first")),
            image_candidate(None),
            image_candidate(None),
        ]))]);
        let generator = generator(backend, dir.path());
        let config = GenerationContentConfig::new("blend them").with_temperature(Some(0.3));

        let summary = generator.run_batch(&spec, &config).await.unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                total: 1,
                success: 1,
                failure: 0
            }
        );

        for name in [
            "applied.png",
            "transferred.png",
            "applied.candidate.1.png",
            "transferred.candidate.1.png",
            "applied.candidate.2.png",
            "transferred.candidate.2.png",
        ] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
        assert!(!dir.path().join("applied.candidate.3.png").exists());

        let entries = generator.api_call_log.read_entries().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].prompt, "blend them");
        assert_eq!(entries[0].model, "fake-image-model");
        assert_eq!(entries[0].temperature, 0.3);
        assert_eq!(entries[2].output_paths.len(), 2);
        assert!(entries[2].output_paths[0].ends_with("applied.candidate.2.png"));
    }

    #[tokio::test]
    async fn request_sends_prompt_then_input_images() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["s.jpg", "r.webp"]);
        let mut spec = PathSpec::new();
        spec.add_item_with_lists(inputs, vec![dir.path().join("o.png")])
            .unwrap();

        let backend = FakeBackend::new(vec![Ok(response(vec![image_candidate(None)]))]);
        let generator = generator(backend, dir.path());
        generator
            .run_batch(&spec, &GenerationContentConfig::new("prompt text"))
            .await
            .unwrap();

        let client = generator.client.as_ref().unwrap();
        let requests = client.requests.borrow();
        assert_eq!(requests.len(), 1);
        let content = &requests[0][0].content;
        assert_eq!(content.len(), 3);
        assert!(matches!(&content[0], LLMMessageType::TEXT(text) if text == "prompt text"));
        // Bytes are PNG regardless of the file name, so the sniffed type wins.
        assert!(matches!(
            &content[1],
            LLMMessageType::IMAGE { file_path: Some(path), .. } if path == "reference_0.png"
        ));
    }

    #[tokio::test]
    async fn item_failures_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_inputs(dir.path(), &["a.png", "b.png"]);
        let mut spec = PathSpec::new();
        spec.add_item_with_lists(good.clone(), vec![dir.path().join("one.png")])
            .unwrap();
        spec.add_item_with_lists(
            vec![good[0].clone(), dir.path().join("missing.png")],
            vec![dir.path().join("two.png")],
        )
        .unwrap();
        spec.add_item_with_lists(good.clone(), vec![dir.path().join("three.png")])
            .unwrap();

        let backend = FakeBackend::new(vec![
            Ok(response(vec![image_candidate(None)])),
            Ok(response(vec![image_candidate(None)])),
        ]);
        let generator = generator(backend, dir.path());
        let config = GenerationContentConfig::new("prompt");

        let summary = generator.run_batch(&spec, &config).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failure, 1);

        assert!(dir.path().join("one.png").exists());
        assert!(!dir.path().join("two.png").exists());
        assert!(dir.path().join("three.png").exists());
        // The unreadable item never reached the backend.
        assert_eq!(generator.client.as_ref().unwrap().requests.borrow().len(), 2);
    }

    #[tokio::test]
    async fn response_shape_and_remote_errors_are_item_failures() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a.png", "b.png"]);
        let mut spec = PathSpec::new();
        for name in ["1.png", "2.png", "3.png", "4.png"] {
            spec.add_item_with_lists(inputs.clone(), vec![dir.path().join(name)])
                .unwrap();
        }

        let backend = FakeBackend::new(vec![
            Ok(response(Vec::new())),
            Ok(response(vec![Candidate {
                content: Some(Content::default()),
                ..Candidate::default()
            }])),
            Err(StatusError {
                status: 503,
                body: "unavailable".into(),
            }
            .into()),
            Err(StatusError {
                status: 400,
                body: "bad".into(),
            }
            .into()),
        ]);
        let generator = generator(backend, dir.path());

        let summary = generator
            .run_batch(&spec, &GenerationContentConfig::new("prompt"))
            .await
            .unwrap();
        assert_eq!(summary.failure, 4);
        assert!(generator.api_call_log.read_entries().await.unwrap().is_empty());
        assert!(
            generator
                .generate_batch(&PathSpec::new(), &GenerationContentConfig::new("p"))
                .await
        );
    }

    #[tokio::test]
    async fn item_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a.png"]);
        let mut spec = PathSpec::new();
        spec.add_item_with_lists(inputs, vec![dir.path().join("o.png")])
            .unwrap();
        let item = &spec.items()[0];
        let config = GenerationContentConfig::new("prompt");

        let backend = FakeBackend::new(vec![
            Ok(response(Vec::new())),
            Err(StatusError {
                status: 500,
                body: "boom".into(),
            }
            .into()),
        ]);
        let generator = generator(backend, dir.path());
        let client = generator.client.as_ref().unwrap();

        assert!(matches!(
            generator.generate_item(client, item, &config).await,
            Err(ItemError::NoCandidates)
        ));
        assert!(matches!(
            generator.generate_item(client, item, &config).await,
            Err(ItemError::ServerError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_items_but_not_after_last() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a.png"]);
        let mut spec = PathSpec::new();
        for name in ["1.png", "2.png", "3.png"] {
            spec.add_item_with_lists(inputs.clone(), vec![dir.path().join(name)])
                .unwrap();
        }

        let backend = FakeBackend::new(vec![
            Ok(response(vec![image_candidate(None)])),
            Ok(response(vec![image_candidate(None)])),
            Ok(response(vec![image_candidate(None)])),
        ]);
        let generator =
            GeminiImageGenerator::with_backend(backend, ApiCallLog::new(dir.path().join("c.log")))
                .with_request_interval(Duration::from_secs(8));

        let started = tokio::time::Instant::now();
        assert!(
            generator
                .generate_batch(&spec, &GenerationContentConfig::new("prompt"))
                .await
        );
        assert_eq!(started.elapsed(), Duration::from_secs(16));
    }
}
