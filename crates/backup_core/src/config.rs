use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RepresentationSet;

/// Markdown converter used for the derived representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivedConverterKind {
    #[default]
    Builtin,
    Html2md,
}

impl std::str::FromStr for DerivedConverterKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "builtin" => Ok(Self::Builtin),
            "html2md" => Ok(Self::Html2md),
            other => Err(ConfigError::UnknownConverter(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("username is not provided")]
    MissingUsername,
    #[error("content width must be greater than zero")]
    ZeroWidth,
    #[error("unknown derived converter {0:?} (expected builtin or html2md)")]
    UnknownConverter(String),
}

/// Settings for one backup run. Built once by the caller and passed down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub username: String,
    pub num_items: usize,
    pub max_retries: u32,
    pub scroll_settle_ms: u64,
    pub click_settle_ms: u64,
    pub console_output: bool,
    pub debug_html: bool,
    pub include_content: bool,
    pub template_filename: String,
    pub content_width: usize,
    pub output_clean: bool,
    pub output_derived: bool,
    pub retry_failed: bool,
    pub derived_converter: DerivedConverterKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            num_items: 10,
            max_retries: 20,
            scroll_settle_ms: 1000,
            click_settle_ms: 300,
            console_output: false,
            debug_html: false,
            include_content: true,
            template_filename: "template.html".to_string(),
            content_width: 80,
            output_clean: true,
            output_derived: true,
            retry_failed: true,
            derived_converter: DerivedConverterKind::Builtin,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        if self.content_width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        Ok(())
    }

    pub fn representations(&self) -> RepresentationSet {
        RepresentationSet {
            clean: self.output_clean,
            derived: self.output_derived,
        }
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }
}
