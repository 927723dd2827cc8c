//! XMLTV guide provider
//!
//! URL-based backend: downloads one XMLTV document (plain or gzip), keeps
//! the parsed document as its snapshot and answers `channels`/`schedule`
//! from it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{GuideCache, GuideProvider, ProviderState};
use crate::errors::{AppError, AppResult};
use crate::models::{Channel, Configuration, Logo};
use crate::utils::url::UrlUtils;
use crate::utils::{DecompressingHttpClient, StandardHttpClient};
use crate::xmltv::{self, Programme, Tv};

/// XMLTV guide provider
pub struct XmltvProvider {
    config: Configuration,
    url: String,
    http_client: StandardHttpClient,
    cache: GuideCache<Tv>,
}

impl XmltvProvider {
    /// Create a provider with a default HTTP client
    pub fn new(config: &Configuration) -> AppResult<Self> {
        Self::with_client(config, StandardHttpClient::new()?)
    }

    /// Create a provider using the given HTTP client.
    ///
    /// Validates `xmltv_url`; performs no I/O.
    pub fn with_client(config: &Configuration, http_client: StandardHttpClient) -> AppResult<Self> {
        let url = UrlUtils::validate_http_url(&config.xmltv_url).map_err(|reason| {
            AppError::configuration(format!(
                "XMLTV provider '{}' needs a valid XMLTVURL: {reason}",
                config.label()
            ))
        })?;

        Ok(Self {
            config: config.clone(),
            url: url.to_string(),
            http_client,
            cache: GuideCache::new(),
        })
    }

    pub async fn state(&self) -> ProviderState {
        self.cache.state().await
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.cache.refreshed_at().await
    }

    async fn fetch_document(&self) -> AppResult<Tv> {
        debug!(
            "Fetching XMLTV document for '{}' from {}",
            self.name(),
            UrlUtils::obfuscate_credentials(&self.url)
        );

        let content = self.http_client.fetch_text(&self.url).await?;
        let tv = xmltv::parse_document(&content)?;

        info!(
            "Parsed XMLTV document for '{}': {} channels, {} programmes",
            self.name(),
            tv.channels.len(),
            tv.programmes.len()
        );
        Ok(tv)
    }

    async fn document(&self) -> AppResult<Arc<Tv>> {
        self.cache.get_or_load(|| self.fetch_document()).await
    }

    fn to_channel(&self, source: &xmltv::Channel) -> Channel {
        let names: Vec<&str> = source
            .display_names
            .iter()
            .map(|d| d.value.trim())
            .collect();

        let name = names
            .iter()
            .find(|n| !n.is_empty())
            .map(|n| n.to_string())
            .unwrap_or_else(|| source.id.clone());

        let number = if !source.lcn.trim().is_empty() {
            source.lcn.trim().to_string()
        } else {
            names
                .iter()
                .skip(1)
                .find(|n| looks_like_channel_number(n))
                .map(|n| n.to_string())
                .unwrap_or_default()
        };

        let call_sign = names
            .get(1)
            .filter(|n| !n.is_empty() && !looks_like_channel_number(n))
            .map(|n| n.to_string())
            .unwrap_or_default();

        Channel {
            id: source.id.clone(),
            name,
            logos: source
                .icons
                .iter()
                .map(|icon| Logo {
                    url: icon.source.clone(),
                    width: icon.width,
                    height: icon.height,
                })
                .collect(),
            number,
            call_sign,
            urls: source.urls.clone(),
            lineup: self.config.name.clone(),
        }
    }
}

/// Digits optionally separated by `.` or `-` (`7`, `7.1`, `2-1`)
fn looks_like_channel_number(value: &str) -> bool {
    !value.is_empty()
        && value.chars().any(|c| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}

#[async_trait]
impl GuideProvider for XmltvProvider {
    fn name(&self) -> String {
        if !self.config.name.is_empty() {
            return self.config.name.clone();
        }
        match UrlUtils::extract_domain(&self.url) {
            Some(host) => format!("XMLTV ({host})"),
            None => "XMLTV".to_string(),
        }
    }

    async fn channels(&self) -> AppResult<Vec<Channel>> {
        let tv = self.document().await?;

        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(tv.channels.len());
        for source in &tv.channels {
            if source.id.is_empty() {
                debug!("Skipping XMLTV channel without id in '{}'", self.name());
                continue;
            }
            if !seen.insert(source.id.as_str()) {
                debug!("Skipping duplicate XMLTV channel '{}'", source.id);
                continue;
            }
            channels.push(self.to_channel(source));
        }

        Ok(channels)
    }

    async fn schedule(&self, channel_ids: &HashSet<String>) -> AppResult<Vec<Programme>> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let tv = self.document().await?;

        let mut seen_programmes = HashSet::new();
        let mut duplicate_count = 0usize;
        let mut programmes = Vec::new();

        for programme in &tv.programmes {
            if !channel_ids.contains(&programme.channel) {
                continue;
            }

            // Same channel, start and title is the same airing listed twice
            let dedup_key = (
                programme.channel.as_str(),
                programme.start.as_str(),
                programme.title().unwrap_or_default(),
            );
            if !seen_programmes.insert(dedup_key) {
                duplicate_count += 1;
                continue;
            }
            programmes.push(programme.clone());
        }

        if duplicate_count > 0 {
            info!(
                "Removed {} duplicate programme entries from XMLTV feed '{}'",
                duplicate_count,
                self.name()
            );
        }

        Ok(programmes)
    }

    async fn refresh(&self) -> AppResult<()> {
        match self.cache.refresh_with(|| self.fetch_document()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Refresh of XMLTV provider '{}' failed: {}", self.name(), e);
                Err(AppError::refresh(self.name(), e.to_string()))
            }
        }
    }

    fn configuration(&self) -> Configuration {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn provider(name: &str, url: &str) -> AppResult<XmltvProvider> {
        XmltvProvider::new(&Configuration {
            name: name.to_string(),
            xmltv_url: url.to_string(),
            ..Default::default()
        })
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("not a url")]
    #[case("ftp://example.com/guide.xml")]
    fn test_rejects_bad_urls(#[case] url: &str) {
        let err = provider("", url).err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_construction_does_no_io() {
        // Nothing listens on this port; construction must still succeed
        let provider = provider("", "http://127.0.0.1:9/guide.xml").unwrap();
        assert_eq!(provider.state().await, ProviderState::Uninitialized);
        assert!(provider.last_refreshed().await.is_none());
    }

    #[test]
    fn test_name_prefers_label_then_host() {
        let named = provider("iptv", "http://example.com/guide.xml").unwrap();
        assert_eq!(named.name(), "iptv");

        let unnamed = provider("", "http://guide.example.com/guide.xml").unwrap();
        assert_eq!(unnamed.name(), "XMLTV (guide.example.com)");
    }

    #[rstest]
    #[case("7", true)]
    #[case("7.1", true)]
    #[case("2-1", true)]
    #[case("KABC", false)]
    #[case("BBC1", false)]
    #[case(".", false)]
    #[case("", false)]
    fn test_looks_like_channel_number(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(looks_like_channel_number(value), expected);
    }

    #[test]
    fn test_to_channel_field_mapping() {
        let provider = provider("iptv", "http://example.com/guide.xml").unwrap();
        let source = xmltv::Channel {
            id: "kabc.us".to_string(),
            display_names: vec![
                xmltv::CommonElement::new("KABC"),
                xmltv::CommonElement::new("KABC-DT"),
                xmltv::CommonElement::new("7.1"),
            ],
            icons: vec![xmltv::Icon {
                source: "http://example.com/kabc.png".to_string(),
                width: 64,
                height: 32,
            }],
            urls: vec!["http://abc7.com".to_string()],
            lcn: String::new(),
        };

        let channel = provider.to_channel(&source);
        assert_eq!(channel.id, "kabc.us");
        assert_eq!(channel.name, "KABC");
        assert_eq!(channel.call_sign, "KABC-DT");
        assert_eq!(channel.number, "7.1");
        assert_eq!(channel.lineup, "iptv");
        assert_eq!(channel.urls, vec!["http://abc7.com".to_string()]);
        assert_eq!(
            channel.logos,
            vec![Logo {
                url: "http://example.com/kabc.png".to_string(),
                width: 64,
                height: 32,
            }]
        );

        // And back again: the three positional display-names survive
        let round_trip = channel.to_xmltv();
        assert_eq!(round_trip.display_names, source.display_names);
    }

    #[test]
    fn test_to_channel_prefers_lcn_and_falls_back_to_id() {
        let provider = provider("", "http://example.com/guide.xml").unwrap();
        let source = xmltv::Channel {
            id: "mystery.tv".to_string(),
            display_names: vec![xmltv::CommonElement::new(""), xmltv::CommonElement::new("12")],
            lcn: "101".to_string(),
            ..Default::default()
        };

        let channel = provider.to_channel(&source);
        assert_eq!(channel.name, "12");
        assert_eq!(channel.number, "101");
        assert!(channel.call_sign.is_empty());

        let bare = provider.to_channel(&xmltv::Channel {
            id: "bare.tv".to_string(),
            ..Default::default()
        });
        assert_eq!(bare.name, "bare.tv");
        assert!(bare.number.is_empty());
    }
}
