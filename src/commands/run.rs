use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use llmapi::providers::gemini::models::ModelInfo;
use llmapi::LLMClient;
use log::{debug, info};

use crate::api_log::ApiCallLog;
use crate::commands::confirm::confirm_to_continue;
use crate::commands::generate::{GeminiImageGenerator, ImageGenerator};
use crate::config::{GlobalConfig, PromptConfig};
use crate::constants::{
    API_CALL_LOG_FILE, DEFAULT_GLOBAL_CONFIG_PATH, DEFAULT_PROMPT_CONFIG_PATH,
};
use crate::fs_utils::ensure_dir;
use crate::models::{GenerationContentConfig, PathSpec};
use crate::path_spec_builder::build_path_spec;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub global_config_path: PathBuf,
    pub prompt_config_path: PathBuf,
    pub api_key: Option<String>,
    pub api_log_path: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            global_config_path: PathBuf::from(DEFAULT_GLOBAL_CONFIG_PATH),
            prompt_config_path: PathBuf::from(DEFAULT_PROMPT_CONFIG_PATH),
            api_key: None,
            api_log_path: PathBuf::from(API_CALL_LOG_FILE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Cancelled,
    Completed,
}

/// Everything validated and planned before the operator is asked to go on.
#[derive(Debug)]
pub struct PreparedRun {
    pub global_config: GlobalConfig,
    pub content_config: GenerationContentConfig,
    pub path_spec: PathSpec,
}

pub fn load_global_config(options: &RunOptions) -> Result<GlobalConfig> {
    let global_config =
        GlobalConfig::load(&options.global_config_path, options.api_key.clone())?;
    Ok(global_config)
}

pub async fn prepare_run(options: &RunOptions) -> Result<PreparedRun> {
    let global_config = load_global_config(options)?;
    let prompt_config = PromptConfig::load(&options.prompt_config_path)?;
    debug!("Prompt entries: {:?}", prompt_config.keys().collect::<Vec<_>>());
    let content_config = prompt_config.content_config(&global_config.generate_content_config_key)?;

    info!(
        "Using prompt '{}' (temperature {}, top_p {}, max output tokens {})",
        global_config.generate_content_config_key,
        content_config.effective_temperature(),
        content_config.effective_top_p(),
        content_config.effective_max_output_tokens()
    );

    let path_spec = build_path_spec(&global_config.input_output_spec)
        .await
        .ok_or_else(|| anyhow!("Failed to build path spec"))?;

    Ok(PreparedRun {
        global_config,
        content_config,
        path_spec,
    })
}

/// Loads and validates both config files, shows the planned work, waits for
/// confirmation on `input`, then generates every item.
pub async fn run_generation<R: BufRead, W: Write>(
    options: &RunOptions,
    input: R,
    output: W,
) -> Result<RunOutcome> {
    let prepared = prepare_run(options).await?;
    prepared.path_spec.show();

    if !confirm_to_continue(input, output).context("Failed to read confirmation")? {
        info!("Exiting without generating images.");
        return Ok(RunOutcome::Cancelled);
    }

    let output_dir = prepared.global_config.input_output_spec.output_dir();
    ensure_dir(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let mut generator: GeminiImageGenerator =
        GeminiImageGenerator::new(ApiCallLog::new(&options.api_log_path))
            .with_request_interval(prepared.global_config.request_interval);
    if !generator.initialize(prepared.global_config.gemini.as_ref()) {
        bail!("Failed to initialize Gemini image generator");
    }

    if !generator
        .generate_batch(&prepared.path_spec, &prepared.content_config)
        .await
    {
        bail!("Image generation could not run");
    }

    Ok(RunOutcome::Completed)
}

pub async fn list_available_models(options: &RunOptions) -> Result<Vec<ModelInfo>> {
    let global_config = load_global_config(options)?;
    let gemini = global_config
        .gemini
        .as_ref()
        .ok_or_else(|| anyhow!("Gemini configuration is missing"))?;
    let api_key = gemini
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("Gemini API key is missing in the configuration"))?;

    let client = LLMClient::new(api_key, gemini.endpoint.as_str(), gemini.model.as_str());
    llmapi::list_models(&client).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    fn write_configs(root: &Path, api_key: &str) -> RunOptions {
        let global = format!(
            r#"
global:
  input_output_spec:
    type: pair_of_directories
    source_dir: {root}/source
    reference_dir: {root}/reference
    output_dir: {root}/output
  generate_content_config_key: portrait
  request_interval_secs: 0
gemini:
  api_key: "{api_key}"
"#,
            root = root.display()
        );
        let prompts = r#"
gemini:
  portrait:
    prompt: "Apply the style of the second image to the first."
    temperature: 0.5
"#;

        std::fs::create_dir_all(root.join("source")).unwrap();
        std::fs::create_dir_all(root.join("reference")).unwrap();
        std::fs::write(root.join("global.yaml"), global).unwrap();
        std::fs::write(root.join("prompts.yaml"), prompts).unwrap();

        RunOptions {
            global_config_path: root.join("global.yaml"),
            prompt_config_path: root.join("prompts.yaml"),
            api_key: None,
            api_log_path: root.join("calls.log"),
        }
    }

    #[tokio::test]
    async fn prepare_selects_prompt_and_builds_spec() {
        let dir = tempfile::tempdir().unwrap();
        let options = write_configs(dir.path(), "test-key");
        std::fs::write(dir.path().join("source/a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("reference/b.png"), b"x").unwrap();

        let prepared = prepare_run(&options).await.unwrap();
        assert_eq!(prepared.path_spec.len(), 1);
        assert_eq!(prepared.content_config.temperature(), Some(0.5));
        assert!(prepared.content_config.prompt().starts_with("Apply the style"));
    }

    #[tokio::test]
    async fn placeholder_key_aborts_before_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let options = write_configs(dir.path(), "YOUR GEMINI API KEY");

        let mut output = Vec::new();
        let result = run_generation(&options, Cursor::new("continue\n"), &mut output).await;
        assert!(result.is_err());
        assert!(output.is_empty());
    }

    #[test]
    fn api_key_override_replaces_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = write_configs(dir.path(), "YOUR GEMINI API KEY");
        options.api_key = Some("from-env".into());

        let config = load_global_config(&options).unwrap();
        assert_eq!(
            config.gemini.unwrap().api_key.as_deref(),
            Some("from-env")
        );
    }

    #[tokio::test]
    async fn exit_halts_before_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let options = write_configs(dir.path(), "test-key");
        std::fs::write(dir.path().join("source/a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("reference/b.png"), b"x").unwrap();

        let outcome = run_generation(&options, Cursor::new("nope\nexit\n"), Vec::new())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(!dir.path().join("output").exists());
        assert!(!dir.path().join("calls.log").exists());
    }

    #[tokio::test]
    async fn empty_batch_completes_and_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = write_configs(dir.path(), "test-key");

        let outcome = run_generation(&options, Cursor::new("continue\n"), Vec::new())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert!(dir.path().join("output").is_dir());
    }

    #[tokio::test]
    async fn missing_source_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = write_configs(dir.path(), "test-key");
        std::fs::remove_dir(dir.path().join("source")).unwrap();

        let err = prepare_run(&options).await.unwrap_err();
        assert!(err.to_string().contains("path spec"));
    }
}
