//! Selectors with an optional `:has-text("...")` suffix, shared by every
//! surface. Neither scraper nor the browser's `querySelectorAll` know the
//! suffix, so the CSS part is handed to them and the text test runs after.

use crate::surface::{SurfaceError, SurfaceFailure};

const HAS_TEXT: &str = ":has-text(";

/// The text match is a case-insensitive substring test on the element's
/// whitespace-normalized text, with `\"`, `\'` and `\\` unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextQuery {
    pub css: String,
    /// Lowercased needle.
    pub text: Option<String>,
}

impl TextQuery {
    pub fn parse(selector: &str) -> Result<Self, SurfaceError> {
        let invalid = || SurfaceError::new(SurfaceFailure::InvalidSelector, selector);
        match selector.find(HAS_TEXT) {
            Some(pos) => {
                let argument = selector[pos + HAS_TEXT.len()..]
                    .trim_end()
                    .strip_suffix(')')
                    .ok_or_else(invalid)?;
                let text = unquote(argument.trim()).ok_or_else(invalid)?;
                Ok(Self {
                    css: selector[..pos].to_string(),
                    text: Some(text.to_lowercase()),
                })
            }
            None => Ok(Self {
                css: selector.to_string(),
                text: None,
            }),
        }
    }

    pub fn accepts_text(&self, text: &str) -> bool {
        match &self.text {
            Some(needle) => normalize_text(text).to_lowercase().contains(needle.as_str()),
            None => true,
        }
    }
}

fn unquote(argument: &str) -> Option<String> {
    let quote = argument.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = argument.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.extend(chars.next());
        } else {
            out.push(c);
        }
    }
    Some(out)
}

pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_text_argument_is_unescaped() {
        let query = TextQuery::parse(r#"div.q:has-text("Say \"hi\" it\'s C:\\me")"#).unwrap();
        assert_eq!(query.css, "div.q");
        assert_eq!(query.text.as_deref(), Some(r#"say "hi" it's c:\me"#));
    }

    #[test]
    fn plain_selectors_pass_through() {
        let query = TextQuery::parse("a.q").unwrap();
        assert_eq!(query.css, "a.q");
        assert!(query.accepts_text("anything"));
    }

    #[test]
    fn unterminated_has_text_is_rejected() {
        assert!(TextQuery::parse(r#"div:has-text("open"#).is_err());
        assert!(TextQuery::parse("div:has-text(bare)").is_err());
    }

    #[test]
    fn text_is_whitespace_normalized() {
        assert_eq!(normalize_text("  a \n b\tc "), "a b c");
        let query = TextQuery::parse(r#"p:has-text("B C")"#).unwrap();
        assert!(query.accepts_text("a\n  b   c d"));
    }
}
