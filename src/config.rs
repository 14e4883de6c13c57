use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_GEMINI_ENDPOINT, DEFAULT_IMAGE_MODEL, DEFAULT_PROMPT_KEY,
    DEFAULT_REQUEST_INTERVAL_SECS, PLACEHOLDER_API_KEY,
};
use crate::error::ConfigError;
use crate::models::GenerationContentConfig;

const PAIR_OF_DIRECTORIES: &str = "pair_of_directories";
const SINGLE_DIRECTORY: &str = "single_directory";

#[derive(Debug, Default, Deserialize)]
struct GlobalConfigFile {
    global: Option<GlobalSection>,
    gemini: Option<GeminiSection>,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalSection {
    input_output_spec: Option<InputOutputSpecSection>,
    generate_content_config_key: Option<String>,
    request_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct InputOutputSpecSection {
    #[serde(rename = "type")]
    kind: Option<String>,
    source_dir: Option<PathBuf>,
    reference_dir: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiSection {
    api_key: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
}

/// Where inputs come from and where outputs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutputSpecConfig {
    PairOfDirectories {
        source_dir: PathBuf,
        reference_dir: PathBuf,
        output_dir: PathBuf,
    },
    SingleDirectory {
        input_dir: PathBuf,
        output_dir: PathBuf,
    },
}

impl InputOutputSpecConfig {
    pub fn output_dir(&self) -> &Path {
        match self {
            InputOutputSpecConfig::PairOfDirectories { output_dir, .. }
            | InputOutputSpecConfig::SingleDirectory { output_dir, .. } => output_dir,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
        }
    }
}

/// The validated global config. A missing `gemini` section is allowed here;
/// the generator refuses to start without a key later on.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub input_output_spec: InputOutputSpecConfig,
    pub generate_content_config_key: String,
    pub request_interval: Duration,
    pub gemini: Option<GeminiConfig>,
}

impl GlobalConfig {
    /// Reads and validates the global config. A non-empty `api_key_override`
    /// (from the command line or environment) replaces `gemini.api_key`
    /// before the placeholder check runs.
    pub fn load(path: &Path, api_key_override: Option<String>) -> Result<Self, ConfigError> {
        let contents = read_config_file(path)?;
        let mut file: GlobalConfigFile =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(key) = api_key_override
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
        {
            file.gemini.get_or_insert_with(GeminiSection::default).api_key = Some(key);
        }
        Self::validate(file)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: GlobalConfigFile =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        Self::validate(file)
    }

    fn validate(file: GlobalConfigFile) -> Result<Self, ConfigError> {
        let global = file.global.ok_or(ConfigError::MissingKey("global"))?;
        let spec = global
            .input_output_spec
            .ok_or(ConfigError::MissingKey("global.input_output_spec"))?;
        let kind = spec
            .kind
            .ok_or(ConfigError::MissingKey("global.input_output_spec.type"))?;

        let output_dir = spec
            .output_dir
            .unwrap_or_else(|| PathBuf::from("data/output"));
        let input_output_spec = match kind.trim() {
            PAIR_OF_DIRECTORIES => InputOutputSpecConfig::PairOfDirectories {
                source_dir: spec
                    .source_dir
                    .unwrap_or_else(|| PathBuf::from("data/source")),
                reference_dir: spec
                    .reference_dir
                    .unwrap_or_else(|| PathBuf::from("data/reference")),
                output_dir,
            },
            SINGLE_DIRECTORY => InputOutputSpecConfig::SingleDirectory {
                input_dir: spec
                    .input_dir
                    .unwrap_or_else(|| PathBuf::from("data/input")),
                output_dir,
            },
            other => return Err(ConfigError::UnknownSpecType(other.to_string())),
        };

        let gemini = match file.gemini {
            Some(section) => {
                let api_key = section.api_key.map(|key| key.trim().to_string());
                if let Some(key) = &api_key {
                    validate_api_key(key)?;
                }
                let defaults = GeminiConfig::default();
                Some(GeminiConfig {
                    api_key: api_key.filter(|key| !key.is_empty()),
                    model: section.model.unwrap_or(defaults.model),
                    endpoint: section.endpoint.unwrap_or(defaults.endpoint),
                })
            }
            None => None,
        };

        Ok(Self {
            input_output_spec,
            generate_content_config_key: global
                .generate_content_config_key
                .unwrap_or_else(|| DEFAULT_PROMPT_KEY.to_string()),
            request_interval: Duration::from_secs(
                global
                    .request_interval_secs
                    .unwrap_or(DEFAULT_REQUEST_INTERVAL_SECS),
            ),
            gemini,
        })
    }
}

fn validate_api_key(key: &str) -> Result<(), ConfigError> {
    if key == PLACEHOLDER_API_KEY {
        return Err(ConfigError::PlaceholderApiKey);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PromptEntry {
    pub prompt: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptConfigFile {
    gemini: Option<BTreeMap<String, PromptEntry>>,
}

/// Named prompt entries; one is picked per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptConfig {
    entries: BTreeMap<String, PromptEntry>,
}

impl PromptConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = read_config_file(path)?;
        let file: PromptConfigFile =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: PromptConfigFile =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        Self::from_file(file)
    }

    fn from_file(file: PromptConfigFile) -> Result<Self, ConfigError> {
        let entries = file.gemini.ok_or(ConfigError::MissingKey("gemini"))?;
        Ok(Self { entries })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn content_config(&self, key: &str) -> Result<GenerationContentConfig, ConfigError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ConfigError::MissingPrompt(key.to_string()))?;

        let prompt = entry
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::EmptyPrompt(key.to_string()))?;

        Ok(GenerationContentConfig::new(prompt)
            .with_temperature(entry.temperature)
            .with_top_p(entry.top_p)
            .with_max_output_tokens(entry.max_output_tokens))
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
