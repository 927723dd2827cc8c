use serde::{Deserialize, Serialize};

use crate::xmltv;

/// A channel image asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Logo {
    #[serde(rename = "URL")]
    pub url: String,
    pub height: u32,
    pub width: u32,
}

/// A channel available in a provider's lineup, with the pieces the guide
/// needs parsed into fields.
///
/// `id` and `name` are always populated by a provider. `number` is only empty
/// when the provider has no numbering scheme at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub logos: Vec<Logo>,
    pub number: String,

    pub call_sign: String,
    pub urls: Vec<String>,
    /// Lineup subscription this channel came from
    pub lineup: String,
}

impl Channel {
    /// Convert to the XMLTV exchange schema.
    ///
    /// Display names are always exactly `[name, call_sign, number]`, empty
    /// values included. MythTV and friends read the first three display-name
    /// elements positionally as name, callsign and channel number.
    pub fn to_xmltv(&self) -> xmltv::Channel {
        xmltv::Channel {
            id: self.id.clone(),
            display_names: vec![
                xmltv::CommonElement::new(self.name.as_str()),
                xmltv::CommonElement::new(self.call_sign.as_str()),
                xmltv::CommonElement::new(self.number.as_str()),
            ],
            icons: self.logos.iter().map(Logo::to_xmltv).collect(),
            urls: self.urls.clone(),
            lcn: self.number.clone(),
        }
    }
}

impl Logo {
    pub fn to_xmltv(&self) -> xmltv::Icon {
        xmltv::Icon {
            source: self.url.clone(),
            width: self.width,
            height: self.height,
        }
    }
}
