use std::env;
use std::fs;
use std::path::PathBuf;

use backup_logging::backup_debug;
use thiserror::Error;

const CONTENT_PLACEHOLDER: &str = "{{content}}";
const TITLE_PLACEHOLDER: &str = "{{title}}";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {name} not found in {}", display_dirs(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },
}

fn display_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Presentation document with `{{content}}` and `{{title}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute the first occurrence of each placeholder. Values are inserted
    /// verbatim and never rescanned for placeholders.
    pub fn render(&self, title: &str, content: &str) -> String {
        let mut slots: Vec<(usize, &str, &str)> = [
            (CONTENT_PLACEHOLDER, content),
            (TITLE_PLACEHOLDER, title),
        ]
        .into_iter()
        .filter_map(|(placeholder, value)| {
            self.text
                .find(placeholder)
                .map(|pos| (pos, placeholder, value))
        })
        .collect();
        slots.sort_by_key(|(pos, _, _)| *pos);

        let mut out = String::with_capacity(self.text.len() + content.len() + title.len());
        let mut cursor = 0;
        for (pos, placeholder, value) in slots {
            out.push_str(&self.text[cursor..pos]);
            out.push_str(value);
            cursor = pos + placeholder.len();
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

/// Current directory first, then the executable's directory.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
    {
        if !dirs.contains(&exe_dir) {
            dirs.push(exe_dir);
        }
    }
    dirs
}

/// Read `name` from the first directory that has it.
pub fn load_template(name: &str, search_dirs: &[PathBuf]) -> Result<Template, TemplateError> {
    for dir in search_dirs {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => {
                backup_debug!("Using template {}", path.display());
                return Ok(Template::new(text));
            }
            Err(err) => backup_debug!("Template not readable at {}: {}", path.display(), err),
        }
    }
    Err(TemplateError::NotFound {
        name: name.to_string(),
        searched: search_dirs.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_first_occurrences_only() {
        let template = Template::new("<title>{{title}}</title>{{content}}|{{title}}|{{content}}");
        assert_eq!(
            template.render("T", "C"),
            "<title>T</title>C|{{title}}|{{content}}"
        );
    }

    #[test]
    fn render_does_not_rescan_inserted_values() {
        let template = Template::new("{{content}}<i>{{title}}</i>");
        assert_eq!(template.render("x", "{{title}}"), "{{title}}<i>x</i>");
    }
}
