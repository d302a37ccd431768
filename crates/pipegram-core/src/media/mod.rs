//! Media payload resolution: inline base64 or a remote URL.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::util::http::build_client;

/// Where a request's media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Base64(String),
    Url(String),
}

impl MediaSource {
    /// Pick the source from optional request fields. Inline base64 wins when
    /// both are present; blank strings count as absent.
    pub fn from_fields(base64: Option<&str>, url: Option<&str>) -> Result<Self, MediaError> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(b64) = present(base64) {
            return Ok(MediaSource::Base64(b64.to_string()));
        }
        if let Some(url) = present(url) {
            return Ok(MediaSource::Url(url.to_string()));
        }
        Err(MediaError::MissingSource)
    }

    /// Like [`MediaSource::from_fields`] but absence is not an error.
    pub fn optional(base64: Option<&str>, url: Option<&str>) -> Option<Self> {
        Self::from_fields(base64, url).ok()
    }
}

/// Decode a base64 payload, dropping any `data:<mime>;base64,` prefix.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, MediaError> {
    let payload = match input.split_once(',') {
        Some((_, rest)) => rest,
        None => input,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| MediaError::InvalidBase64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    Ok(bytes)
}

/// Accept only absolute http(s) URLs.
pub fn validate_url(raw: &str) -> Result<Url, MediaError> {
    let url = Url::parse(raw).map_err(|e| MediaError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(MediaError::InvalidUrl(format!(
            "unsupported scheme '{scheme}' in {raw}"
        ))),
    }
}

/// Downloads or decodes media with the configured limits.
#[derive(Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    max_attempts: u32,
    max_bytes: usize,
    backoff: Duration,
}

impl MediaFetcher {
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        let client = build_client(
            Duration::from_secs(config.fetch_timeout_secs.max(1)),
            &config.user_agent,
        )
        .map_err(|e| MediaError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            max_attempts: config.max_retries.max(1),
            max_bytes: config.max_bytes,
            backoff: Duration::from_secs(1),
        })
    }

    /// Override the base delay between rate-limited attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn fetch(&self, source: &MediaSource) -> Result<Vec<u8>, MediaError> {
        let bytes = match source {
            MediaSource::Base64(b64) => decode_base64(b64)?,
            MediaSource::Url(url) => self.download(url).await?,
        };
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    fn check_size(&self, len: usize) -> Result<(), MediaError> {
        if len == 0 {
            return Err(MediaError::Empty);
        }
        if self.max_bytes > 0 && len > self.max_bytes {
            return Err(MediaError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    async fn download(&self, raw: &str) -> Result<Vec<u8>, MediaError> {
        let url = validate_url(raw)?;

        let mut attempt = 1;
        let mut resp = loop {
            let resp = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| MediaError::Fetch(e.to_string()))?;

            if resp.status() != StatusCode::TOO_MANY_REQUESTS || attempt >= self.max_attempts {
                break resp;
            }
            let delay = self.backoff * attempt;
            warn!(
                "Media host rate limited {} (attempt {}/{}), retrying in {:?}",
                url.host_str().unwrap_or("?"),
                attempt,
                self.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }
        if let Some(len) = resp.content_length() {
            if self.max_bytes > 0 && len > self.max_bytes as u64 {
                return Err(MediaError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if self.max_bytes > 0 && body.len() > self.max_bytes {
                return Err(MediaError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        debug!("Downloaded {} bytes from {}", body.len(), url.host_str().unwrap_or("?"));
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_wins_over_url() {
        let source = MediaSource::from_fields(Some("aGk="), Some("https://x/y.jpg")).unwrap();
        assert_eq!(source, MediaSource::Base64("aGk=".to_string()));

        let source = MediaSource::from_fields(Some("  "), Some("https://x/y.jpg")).unwrap();
        assert_eq!(source, MediaSource::Url("https://x/y.jpg".to_string()));
    }

    #[test]
    fn test_missing_source() {
        assert!(matches!(
            MediaSource::from_fields(None, None),
            Err(MediaError::MissingSource)
        ));
        assert!(matches!(
            MediaSource::from_fields(Some(""), Some("")),
            Err(MediaError::MissingSource)
        ));
        assert!(MediaSource::optional(None, None).is_none());
    }

    #[test]
    fn test_decode_plain_and_data_uri() {
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64("data:image/jpeg;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert_eq!(decode_base64("aGVs\nbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_invalid() {
        assert!(matches!(
            decode_base64("not base64!!"),
            Err(MediaError::InvalidBase64(_))
        ));
        assert!(matches!(decode_base64("data:image/png;base64,"), Err(MediaError::Empty)));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://cdn.example.com/a.jpg").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/v.mp4").is_ok());
        assert!(matches!(validate_url("ftp://host/a"), Err(MediaError::InvalidUrl(_))));
        assert!(matches!(validate_url("file:///etc/passwd"), Err(MediaError::InvalidUrl(_))));
        assert!(matches!(validate_url("not a url"), Err(MediaError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_base64_respects_limits() {
        let config = MediaConfig {
            max_bytes: 4,
            ..Default::default()
        };
        let fetcher = MediaFetcher::new(&config).unwrap();

        let ok = fetcher.fetch(&MediaSource::Base64("aGk=".into())).await.unwrap();
        assert_eq!(ok, b"hi");

        let err = fetcher
            .fetch(&MediaSource::Base64("aGVsbG8=".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_url_without_network() {
        let fetcher = MediaFetcher::new(&MediaConfig::default()).unwrap();
        let err = fetcher
            .fetch(&MediaSource::Url("gopher://x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidUrl(_)));
    }
}
