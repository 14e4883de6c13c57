use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use crate::error::PathSpecError;

/// One generation request: the images sent together and the files the
/// primary candidate is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSpecItem {
    input_file_path_list: Vec<PathBuf>,
    output_file_path_list: Vec<PathBuf>,
}

impl PathSpecItem {
    pub fn input_file_path_list(&self) -> &[PathBuf] {
        &self.input_file_path_list
    }

    pub fn output_file_path_list(&self) -> &[PathBuf] {
        &self.output_file_path_list
    }
}

/// Ordered work list for one run. Insertion order is processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathSpec {
    items: Vec<PathSpecItem>,
}

impl PathSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item_with_lists(
        &mut self,
        input_file_path_list: Vec<PathBuf>,
        output_file_path_list: Vec<PathBuf>,
    ) -> Result<(), PathSpecError> {
        if input_file_path_list.is_empty() {
            return Err(PathSpecError::EmptyInputList);
        }
        if output_file_path_list.is_empty() {
            return Err(PathSpecError::EmptyOutputList);
        }

        self.items.push(PathSpecItem {
            input_file_path_list,
            output_file_path_list,
        });
        Ok(())
    }

    pub fn items(&self) -> &[PathSpecItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn show(&self) {
        log::info!("Path spec contains {} item(s)", self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            log::info!(
                "[{index}] inputs: {:?} -> outputs: {:?}",
                item.input_file_path_list,
                item.output_file_path_list
            );
        }
    }
}

/// Prompt and tuning parameters for every request in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContentConfig {
    prompt: String,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GenerationContentConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            top_p: None,
            max_output_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn top_p(&self) -> Option<f32> {
        self.top_p
    }

    pub fn max_output_tokens(&self) -> Option<u32> {
        self.max_output_tokens
    }

    pub fn effective_temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn effective_top_p(&self) -> f32 {
        self.top_p.unwrap_or(DEFAULT_TOP_P)
    }

    pub fn effective_max_output_tokens(&self) -> u32 {
        self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
    }
}

/// One line of the API call log: a generation whose image reached disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLogEntry {
    pub timestamp: u64,
    pub model: String,
    pub prompt: String,
    pub input_paths: Vec<String>,
    pub output_paths: Vec<String>,
    pub temperature: f32,
    pub top_p: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_spec_starts_empty() {
        let spec = PathSpec::new();
        assert!(spec.is_empty());
        assert!(spec.items().is_empty());
    }

    #[test]
    fn items_keep_insertion_order() {
        let mut spec = PathSpec::new();
        spec.add_item_with_lists(
            vec!["a.png".into(), "b.png".into()],
            vec!["c.png".into()],
        )
        .unwrap();
        spec.add_item_with_lists(
            vec!["x.jpg".into(), "y.jpg".into()],
            vec!["z.jpg".into()],
        )
        .unwrap();

        assert_eq!(spec.len(), 2);
        assert_eq!(
            spec.items()[0].input_file_path_list(),
            &[PathBuf::from("a.png"), PathBuf::from("b.png")]
        );
        assert_eq!(spec.items()[1].output_file_path_list(), &[PathBuf::from("z.jpg")]);
    }

    #[test]
    fn empty_lists_are_rejected() {
        let mut spec = PathSpec::new();
        assert_eq!(
            spec.add_item_with_lists(Vec::new(), vec!["out.png".into()]),
            Err(PathSpecError::EmptyInputList)
        );
        assert_eq!(
            spec.add_item_with_lists(vec!["in.png".into()], Vec::new()),
            Err(PathSpecError::EmptyOutputList)
        );
        assert!(spec.is_empty());
    }

    #[test]
    fn content_config_falls_back_to_defaults() {
        let config = GenerationContentConfig::new("blend").with_top_p(Some(0.5));
        assert_eq!(config.prompt(), "blend");
        assert_eq!(config.temperature(), None);
        assert_eq!(config.effective_temperature(), DEFAULT_TEMPERATURE);
        assert_eq!(config.effective_top_p(), 0.5);
        assert_eq!(config.effective_max_output_tokens(), DEFAULT_MAX_OUTPUT_TOKENS);
    }
}
