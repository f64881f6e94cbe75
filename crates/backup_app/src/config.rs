//! Layered run configuration.
//!
//! Layers, lowest first: built-in defaults, `backup.ron` next to the
//! executable, `backup.ron` in the current directory, environment variables,
//! command-line flags. Each layer is a [`ConfigPatch`]; a set field replaces
//! whatever the layers below it said.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use backup_core::{format_username, DerivedConverterKind, RunConfig};
use backup_logging::backup_debug;
use ron::extensions::Extensions;
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "backup.ron";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigPatch {
    pub username: Option<String>,
    pub num_items: Option<usize>,
    pub max_retries: Option<u32>,
    pub scroll_settle_ms: Option<u64>,
    pub click_settle_ms: Option<u64>,
    pub console_output: Option<bool>,
    pub debug_html: Option<bool>,
    pub include_content: Option<bool>,
    pub template_filename: Option<String>,
    pub content_width: Option<usize>,
    pub output_clean: Option<bool>,
    pub output_derived: Option<bool>,
    pub retry_failed: Option<bool>,
    pub derived_converter: Option<DerivedConverterKind>,
}

impl ConfigPatch {
    /// Parse a RON patch. Fields may be written without `Some(..)`.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(text)
    }

    /// Read the patch from environment-style variables. Empty values count as
    /// unset.
    pub fn from_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Ok(Self {
            username: var("QUORA_USERNAME"),
            num_items: parse_number(var("NUM_ITEMS"), "NUM_ITEMS")?,
            max_retries: parse_number(var("MAX_RETRIES"), "MAX_RETRIES")?,
            scroll_settle_ms: parse_number(var("SCROLL_TIMEOUT_MS"), "SCROLL_TIMEOUT_MS")?,
            click_settle_ms: parse_number(var("ANSWER_CLICK_MS"), "ANSWER_CLICK_MS")?,
            console_output: var("CONSOLE_OUTPUT").map(|v| parse_flag(&v)),
            debug_html: var("DEBUG_HTML").map(|v| parse_flag(&v)),
            include_content: var("INCLUDE_ANSWER_TEXT").map(|v| parse_flag(&v)),
            template_filename: var("HTML_TEMPLATE_FILENAME"),
            content_width: parse_number(var("HTML_WIDTH"), "HTML_WIDTH")?,
            output_clean: var("OUTPUT_HTML_FILES").map(|v| parse_flag(&v)),
            output_derived: var("OUTPUT_MARKDOWN_FILES").map(|v| parse_flag(&v)),
            retry_failed: var("RETRY_FAILED").map(|v| parse_flag(&v)),
            derived_converter: var("DERIVED_CONVERTER")
                .map(|v| v.parse::<DerivedConverterKind>())
                .transpose()
                .context("DERIVED_CONVERTER")?,
        })
    }

    /// Combine two layers; fields set in `upper` win.
    pub fn overlay(self, upper: ConfigPatch) -> ConfigPatch {
        ConfigPatch {
            username: upper.username.or(self.username),
            num_items: upper.num_items.or(self.num_items),
            max_retries: upper.max_retries.or(self.max_retries),
            scroll_settle_ms: upper.scroll_settle_ms.or(self.scroll_settle_ms),
            click_settle_ms: upper.click_settle_ms.or(self.click_settle_ms),
            console_output: upper.console_output.or(self.console_output),
            debug_html: upper.debug_html.or(self.debug_html),
            include_content: upper.include_content.or(self.include_content),
            template_filename: upper.template_filename.or(self.template_filename),
            content_width: upper.content_width.or(self.content_width),
            output_clean: upper.output_clean.or(self.output_clean),
            output_derived: upper.output_derived.or(self.output_derived),
            retry_failed: upper.retry_failed.or(self.retry_failed),
            derived_converter: upper.derived_converter.or(self.derived_converter),
        }
    }

    pub fn apply(self, base: RunConfig) -> RunConfig {
        RunConfig {
            username: self.username.unwrap_or(base.username),
            num_items: self.num_items.unwrap_or(base.num_items),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            scroll_settle_ms: self.scroll_settle_ms.unwrap_or(base.scroll_settle_ms),
            click_settle_ms: self.click_settle_ms.unwrap_or(base.click_settle_ms),
            console_output: self.console_output.unwrap_or(base.console_output),
            debug_html: self.debug_html.unwrap_or(base.debug_html),
            include_content: self.include_content.unwrap_or(base.include_content),
            template_filename: self.template_filename.unwrap_or(base.template_filename),
            content_width: self.content_width.unwrap_or(base.content_width),
            output_clean: self.output_clean.unwrap_or(base.output_clean),
            output_derived: self.output_derived.unwrap_or(base.output_derived),
            retry_failed: self.retry_failed.unwrap_or(base.retry_failed),
            derived_converter: self.derived_converter.unwrap_or(base.derived_converter),
        }
    }
}

/// `true`, `yes`, `1` and `on` in any case; everything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

fn parse_number<T>(value: Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{key} must be a non-negative integer"))
}

/// Read one config file. A missing file is an empty layer.
pub fn load_file(path: &Path) -> Result<ConfigPatch> {
    match fs::read_to_string(path) {
        Ok(text) => {
            backup_debug!("Reading configuration from {:?}", path);
            ConfigPatch::from_ron(&text).with_context(|| format!("invalid config file {path:?}"))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ConfigPatch::default()),
        Err(err) => Err(err).with_context(|| format!("cannot read config file {path:?}")),
    }
}

/// Directories searched for `backup.ron`, lowest precedence first.
pub fn config_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(dir);
    }
    if let Ok(cwd) = env::current_dir() {
        if !dirs.contains(&cwd) {
            dirs.push(cwd);
        }
    }
    dirs
}

/// Fold every layer into a final configuration. The username is formatted
/// but not validated; commands that need one check it themselves.
pub fn resolve<F>(dirs: &[PathBuf], lookup: F, cli: ConfigPatch) -> Result<RunConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut patch = ConfigPatch::default();
    for dir in dirs {
        patch = patch.overlay(load_file(&dir.join(CONFIG_FILENAME))?);
    }
    patch = patch.overlay(ConfigPatch::from_env(lookup)?).overlay(cli);

    let mut config = patch.apply(RunConfig::default());
    config.username = format_username(config.username.trim());
    Ok(config)
}

/// The formatted username, or an error naming where it can be set.
pub fn require_username(config: &RunConfig) -> Result<&str> {
    if config.username.is_empty() {
        return Err(anyhow!(
            "username is not provided (pass it on the command line, set QUORA_USERNAME, or add it to {CONFIG_FILENAME})"
        ));
    }
    Ok(&config.username)
}
