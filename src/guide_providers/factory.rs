//! Provider resolution
//!
//! Maps a [`Configuration`]'s `provider` string onto a concrete backend. The
//! mapping is a closed table, so new backends are added here and nowhere else.

use std::sync::Arc;
use tracing::{debug, warn};

use super::{GuideProvider, SchedulesDirectProvider, XmltvProvider};
use crate::errors::AppResult;
use crate::models::Configuration;
use crate::utils::StandardHttpClient;

/// Backends a configuration can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    SchedulesDirect,
    Xmltv,
}

/// Lower-case aliases selecting the Schedules Direct backend
const SCHEDULES_DIRECT_ALIASES: &[&str] = &["schedulesdirect", "schedules-direct", "sd"];

impl ProviderKind {
    /// Resolve a provider name, case-insensitively.
    ///
    /// Anything that is not a Schedules Direct alias, including the empty
    /// string, selects XMLTV.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.to_lowercase();
        if SCHEDULES_DIRECT_ALIASES.contains(&normalized.as_str()) {
            Self::SchedulesDirect
        } else {
            Self::Xmltv
        }
    }

    /// Whether `name` is spelled like a known backend (used to flag typos)
    pub fn is_recognized(name: &str) -> bool {
        let normalized = name.to_lowercase();
        normalized.is_empty()
            || normalized == "xmltv"
            || SCHEDULES_DIRECT_ALIASES.contains(&normalized.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchedulesDirect => "schedules_direct",
            Self::Xmltv => "xmltv",
        }
    }
}

impl Configuration {
    /// Build the backend this configuration selects.
    ///
    /// Never performs I/O. Fails with a configuration error when the selected
    /// backend is missing required settings.
    pub fn get_provider(&self) -> AppResult<Arc<dyn GuideProvider>> {
        self.get_provider_with_client(StandardHttpClient::new()?)
    }

    /// Same as [`get_provider`](Self::get_provider) with a caller-supplied
    /// HTTP client, which carries the request deadlines.
    pub fn get_provider_with_client(
        &self,
        http_client: StandardHttpClient,
    ) -> AppResult<Arc<dyn GuideProvider>> {
        let kind = ProviderKind::from_name(&self.provider);

        if !ProviderKind::is_recognized(&self.provider) {
            warn!(
                "Unrecognized provider '{}' for '{}', falling back to XMLTV",
                self.provider,
                self.label()
            );
        }
        debug!("Resolved provider '{}' to {}", self.label(), kind.as_str());

        match kind {
            ProviderKind::SchedulesDirect => Ok(Arc::new(SchedulesDirectProvider::with_client(
                self,
                http_client,
            )?)),
            ProviderKind::Xmltv => Ok(Arc::new(XmltvProvider::with_client(self, http_client)?)),
        }
    }
}
