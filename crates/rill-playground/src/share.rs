//! Shareable playground links.
//!
//! A link carries the source text base64url-encoded in its `code` query
//! parameter. Shortening goes through an is.gd-style HTTP endpoint and
//! degrades to the long link on any failure.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{PlaygroundError, PlaygroundResult};

/// Share link configuration.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    /// Playground page that understands the `code` parameter.
    pub base_url: String,
    /// Shortener endpoint, `None` to always hand out long links.
    pub shortener_url: Option<String>,
    pub timeout: Duration,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rill-lang.org/playground".to_string(),
            shortener_url: Some("https://is.gd/create.php".to_string()),
            timeout: Duration::from_secs(5),
        }
    }
}

/// A produced link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub url: String,
    pub shortened: bool,
}

/// Builds and shortens share links.
#[derive(Debug, Clone)]
pub struct ShareLinks {
    config: ShareConfig,
    client: reqwest::Client,
}

impl ShareLinks {
    pub fn new(config: ShareConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The unshortened link for `source`.
    pub fn long_link(&self, source: &str) -> String {
        format!(
            "{}?code={}",
            self.config.base_url,
            URL_SAFE_NO_PAD.encode(source)
        )
    }

    /// Produce a link for `source`, shortened when the shortener cooperates.
    pub async fn share(&self, source: &str) -> ShareLink {
        let url = self.long_link(source);
        let Some(shortener) = &self.config.shortener_url else {
            return ShareLink {
                url,
                shortened: false,
            };
        };

        match self.shorten(shortener, &url).await {
            Ok(short) => ShareLink {
                url: short,
                shortened: true,
            },
            Err(e) => {
                tracing::warn!("Falling back to long share link: {}", e);
                ShareLink {
                    url,
                    shortened: false,
                }
            }
        }
    }

    async fn shorten(&self, shortener: &str, url: &str) -> PlaygroundResult<String> {
        let body = self
            .client
            .get(shortener)
            .query(&[("format", "simple"), ("url", url)])
            .timeout(self.config.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let short = body.trim();
        if short.starts_with("http://") || short.starts_with("https://") {
            Ok(short.to_string())
        } else {
            Err(PlaygroundError::Shortener(format!(
                "unexpected response: {:?}",
                short
            )))
        }
    }
}

/// Recover the source text carried by a long share link.
pub fn decode_share_link(link: &str) -> PlaygroundResult<String> {
    let query = link
        .split_once('?')
        .map(|(_, query)| query)
        .ok_or_else(|| PlaygroundError::InvalidShareLink("missing query".to_string()))?;
    let code = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("code="))
        .ok_or_else(|| PlaygroundError::InvalidShareLink("missing `code` parameter".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(code.trim_end_matches('='))
        .map_err(|e| PlaygroundError::InvalidShareLink(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PlaygroundError::InvalidShareLink(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_link_round_trips() {
        let links = ShareLinks::new(ShareConfig::default());
        let source = "let s = \"héllo?&\"\nprint(s)";
        let link = links.long_link(source);
        assert!(link.starts_with("https://rill-lang.org/playground?code="));
        assert_eq!(decode_share_link(&link).unwrap(), source);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_share_link("https://example.com/"),
            Err(PlaygroundError::InvalidShareLink(_))
        ));
        assert!(decode_share_link("https://example.com/?code=***").is_err());
    }

    #[tokio::test]
    async fn test_no_shortener_gives_long_link() {
        let links = ShareLinks::new(ShareConfig {
            shortener_url: None,
            ..ShareConfig::default()
        });
        let link = links.share("1").await;
        assert!(!link.shortened);
        assert_eq!(link.url, links.long_link("1"));
    }
}
