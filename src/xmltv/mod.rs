//! XMLTV exchange schema
//!
//! The canonical output format used to interchange guide data with
//! downstream consumers. Only the elements this crate reads or writes are
//! modelled; everything else in a source document is skipped by the reader.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub mod reader;
pub mod writer;

pub use reader::parse_document;
pub use writer::write_document;

/// Timestamp layout used by XMLTV `start`/`stop` attributes
pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Root `<tv>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tv {
    pub generator_info_name: Option<String>,
    pub source_info_name: Option<String>,
    pub channels: Vec<Channel>,
    pub programmes: Vec<Programme>,
}

/// `<channel>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub display_names: Vec<CommonElement>,
    pub icons: Vec<Icon>,
    pub urls: Vec<String>,
    /// Logical channel number
    pub lcn: String,
}

/// Text element with an optional `lang` attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonElement {
    pub value: String,
    pub lang: Option<String>,
}

impl CommonElement {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lang: None,
        }
    }
}

/// `<icon>` element; zero width/height means "not stated"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

/// `<episode-num system="...">`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeNum {
    pub system: String,
    pub value: String,
}

/// `<programme>` element
///
/// Providers pass these through unchanged; nothing downstream of
/// `GuideProvider::schedule` inspects more than `channel` and `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    pub channel: String,
    pub start: String,
    pub stop: Option<String>,
    pub titles: Vec<CommonElement>,
    pub sub_titles: Vec<CommonElement>,
    pub descriptions: Vec<CommonElement>,
    pub categories: Vec<CommonElement>,
    pub episode_nums: Vec<EpisodeNum>,
    pub icons: Vec<Icon>,
    pub new: bool,
    pub previously_shown: bool,
}

impl Programme {
    /// First title, if any
    pub fn title(&self) -> Option<&str> {
        self.titles.first().map(|t| t.value.as_str())
    }

    /// Parsed start time
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        parse_time(&self.start)
    }
}

/// Format a UTC instant the way XMLTV expects (`20240101120000 +0000`)
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(XMLTV_TIME_FORMAT).to_string()
}

/// Parse an XMLTV timestamp, with or without a zone offset (offsetless
/// values are taken as UTC)
pub fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_str(value, XMLTV_TIME_FORMAT)
        .ok()
        .or_else(|| {
            let digits = value.get(..14)?;
            let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok()?;
            Some(FixedOffset::east_opt(0)?.from_utc_datetime(&naive))
        })
}
