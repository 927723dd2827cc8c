use serde::{Deserialize, Serialize};
use std::fmt;

/// User-supplied settings describing one guide provider.
///
/// This is a descriptor, not a provider: resolve it with
/// [`Configuration::get_provider`](crate::guide_providers). Fields a backend
/// does not use are ignored by it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Internal label; never serialized
    #[serde(skip)]
    pub name: String,
    /// Backend selector, matched case-insensitively
    #[serde(rename = "Provider", alias = "provider")]
    pub provider: String,

    // Only used for the Schedules Direct provider
    #[serde(rename = "Username", alias = "username")]
    pub username: String,
    #[serde(rename = "Password", alias = "password")]
    pub password: String,
    #[serde(rename = "Lineups", alias = "lineups")]
    pub lineups: Vec<String>,

    // Only used for the XMLTV provider
    #[serde(rename = "XMLTVURL", alias = "xmltv_url")]
    pub xmltv_url: String,
}

impl Configuration {
    /// Label for logs: the configured name, or the selector when unnamed
    pub fn label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.provider.is_empty() {
            &self.provider
        } else {
            "unnamed"
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field(
                "password",
                &if self.password.is_empty() { "" } else { "****" },
            )
            .field("lineups", &self.lineups)
            .field("xmltv_url", &self.xmltv_url)
            .finish()
    }
}
