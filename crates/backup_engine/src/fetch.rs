use std::time::Duration;

use backup_logging::backup_debug;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;

use crate::decode::decode_html;
use crate::surface::{SurfaceError, SurfaceFailure};

/// A page as delivered to a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// Where the request ended up after redirects.
    pub final_url: String,
    pub html: String,
}

/// Where a static surface gets its documents from.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, url: &str) -> Result<LoadedPage, SurfaceError>;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Media types accepted from the `Content-Type` header. A response
    /// without the header is accepted.
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: concat!("answer-backup/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Plain HTTP page source: one GET per navigation, no script execution.
#[derive(Debug, Clone)]
pub struct ReqwestPageSource {
    settings: FetchSettings,
}

impl ReqwestPageSource {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn client(&self) -> Result<reqwest::Client, SurfaceError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.settings.redirect_limit))
            .user_agent(self.settings.user_agent.as_str())
            .build()
            .map_err(|err| SurfaceError::new(SurfaceFailure::Network, err.to_string()))
    }

    /// Status, declared length and media type, checked before the body is
    /// read. Returns the raw `Content-Type` value for charset sniffing.
    fn accept(&self, response: &Response) -> Result<Option<String>, SurfaceError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SurfaceError::new(
                SurfaceFailure::HttpStatus(status.as_u16()),
                format!("{} returned {}", response.url(), status),
            ));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.settings.max_bytes {
                return Err(self.too_large(declared));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        match content_type.as_deref() {
            Some(value) if !self.allows(value) => Err(SurfaceError::new(
                SurfaceFailure::UnsupportedContentType {
                    content_type: value.to_string(),
                },
                format!("{} is not a document", response.url()),
            )),
            _ => Ok(content_type),
        }
    }

    fn allows(&self, content_type: &str) -> bool {
        let media_type = content_type
            .split_once(';')
            .map_or(content_type, |(media_type, _)| media_type)
            .trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }

    fn too_large(&self, actual: u64) -> SurfaceError {
        SurfaceError::new(
            SurfaceFailure::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "page exceeds the size limit",
        )
    }

    /// Stream the body, stopping as soon as it passes `max_bytes`.
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, SurfaceError> {
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(classify)?;
            let len = (body.len() + chunk.len()) as u64;
            if len > self.settings.max_bytes {
                return Err(self.too_large(len));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl PageSource for ReqwestPageSource {
    async fn load(&self, url: &str) -> Result<LoadedPage, SurfaceError> {
        let target = reqwest::Url::parse(url)
            .map_err(|err| SurfaceError::new(SurfaceFailure::InvalidUrl, format!("{url}: {err}")))?;
        let response = self.client()?.get(target).send().await.map_err(classify)?;

        let content_type = self.accept(&response)?;
        let final_url = response.url().to_string();
        let body = self.read_body(response).await?;

        let decoded = decode_html(&body, content_type.as_deref())
            .map_err(|err| SurfaceError::new(SurfaceFailure::Decode, err.to_string()))?;
        backup_debug!(
            "Loaded {} ({} bytes as {})",
            final_url,
            body.len(),
            decoded.encoding_label
        );

        Ok(LoadedPage {
            final_url,
            html: decoded.html,
        })
    }
}

fn classify(err: reqwest::Error) -> SurfaceError {
    let kind = if err.is_timeout() {
        SurfaceFailure::Timeout
    } else if err.is_redirect() {
        SurfaceFailure::RedirectLimitExceeded
    } else {
        SurfaceFailure::Network
    };
    SurfaceError::new(kind, err.to_string())
}
