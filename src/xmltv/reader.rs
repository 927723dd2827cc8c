//! Quick-XML based XMLTV reader
//!
//! Streams through the document with quick-xml and keeps only the elements
//! modelled in [`crate::xmltv`]. Credits, ratings, video/audio details and
//! other programme metadata are skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use super::{Channel, CommonElement, EpisodeNum, Icon, Programme, Tv};
use crate::errors::{AppResult, SourceError};

const SOURCE_TYPE: &str = "xmltv";

/// Parse a complete XMLTV document
pub fn parse_document(content: &str) -> AppResult<Tv> {
    let mut reader = Reader::from_str(content);
    let mut state = ReaderState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e)?;
                let attrs = parse_attributes(e);
                state.open(&name, attrs);
            }

            Ok(Event::Empty(ref e)) => {
                let name = element_name(e)?;
                let attrs = parse_attributes(e);
                state.open(&name, attrs);
                state.close(&name)?;
            }

            Ok(Event::End(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|e| parse_error(format!("Invalid UTF-8 in XML element name: {e}")))?
                    .to_string();
                state.close(&name)?;
            }

            Ok(Event::Text(e)) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| parse_error(format!("Invalid UTF-8 in text: {e}")))?;
                state.text.push_str(text);
            }

            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| parse_error(format!("Invalid UTF-8 in CDATA: {e}")))?;
                // Escape so the final unescape pass leaves CDATA content verbatim
                state.text.push_str(&quick_xml::escape::escape(text));
            }

            Ok(Event::GeneralRef(e)) => {
                let entity = std::str::from_utf8(&e)
                    .map_err(|e| parse_error(format!("Invalid UTF-8 in entity: {e}")))?;
                state.text.push('&');
                state.text.push_str(entity);
                state.text.push(';');
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(parse_error(format!(
                    "XML parsing error at position {}: {e}",
                    reader.error_position()
                )));
            }

            _ => {}
        }
    }

    if !state.saw_root {
        return Err(parse_error("document has no <tv> root element"));
    }
    if !state.root_closed {
        return Err(parse_error("document ends before </tv>, likely truncated"));
    }

    Ok(state.tv)
}

/// Element currently collecting text, with the attribute that qualifies it
struct PendingText {
    qualifier: Option<String>,
}

#[derive(Default)]
struct ReaderState {
    tv: Tv,
    saw_root: bool,
    root_closed: bool,
    channel: Option<Channel>,
    programme: Option<Programme>,
    pending: Option<PendingText>,
    text: String,
}

impl ReaderState {
    fn open(&mut self, name: &str, mut attrs: HashMap<String, String>) {
        self.text.clear();

        match name {
            "tv" => {
                self.saw_root = true;
                self.tv.generator_info_name = attrs.remove("generator-info-name");
                self.tv.source_info_name = attrs.remove("source-info-name");
            }
            "channel" if self.programme.is_none() => {
                self.channel = Some(Channel {
                    id: attrs.remove("id").unwrap_or_default(),
                    ..Default::default()
                });
            }
            "programme" => {
                self.programme = Some(Programme {
                    channel: attrs.remove("channel").unwrap_or_default(),
                    start: attrs.remove("start").unwrap_or_default(),
                    stop: attrs.remove("stop"),
                    ..Default::default()
                });
            }
            "icon" => {
                let icon = Icon {
                    source: attrs.remove("src").unwrap_or_default(),
                    width: parse_dimension(attrs.get("width")),
                    height: parse_dimension(attrs.get("height")),
                };
                if icon.source.is_empty() {
                    return;
                }
                if let Some(programme) = self.programme.as_mut() {
                    programme.icons.push(icon);
                } else if let Some(channel) = self.channel.as_mut() {
                    channel.icons.push(icon);
                }
            }
            "new" => {
                if let Some(programme) = self.programme.as_mut() {
                    programme.new = true;
                }
            }
            "previously-shown" => {
                if let Some(programme) = self.programme.as_mut() {
                    programme.previously_shown = true;
                }
            }
            "episode-num" => {
                self.pending = Some(PendingText {
                    qualifier: attrs.remove("system"),
                });
            }
            "display-name" | "url" | "lcn" | "title" | "sub-title" | "desc" | "category" => {
                self.pending = Some(PendingText {
                    qualifier: attrs.remove("lang"),
                });
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) -> AppResult<()> {
        match name {
            "tv" => self.root_closed = true,
            "channel" if self.programme.is_none() => {
                if let Some(channel) = self.channel.take() {
                    self.tv.channels.push(channel);
                }
            }
            "programme" => {
                if let Some(programme) = self.programme.take() {
                    self.tv.programmes.push(programme);
                }
            }
            _ => {
                if let Some(pending) = self.pending.take() {
                    let value = self.take_text()?;
                    self.assign(name, value, pending.qualifier);
                }
            }
        }

        self.text.clear();
        Ok(())
    }

    fn take_text(&mut self) -> AppResult<String> {
        let raw = std::mem::take(&mut self.text);
        let unescaped = quick_xml::escape::unescape(raw.trim())
            .map_err(|e| parse_error(format!("Invalid entity in text: {e}")))?;
        Ok(unescaped.into_owned())
    }

    fn assign(&mut self, name: &str, value: String, qualifier: Option<String>) {
        if let Some(programme) = self.programme.as_mut() {
            let element = CommonElement {
                value,
                lang: qualifier,
            };
            match name {
                "title" => programme.titles.push(element),
                "sub-title" => programme.sub_titles.push(element),
                "desc" => programme.descriptions.push(element),
                "category" => programme.categories.push(element),
                "episode-num" => programme.episode_nums.push(EpisodeNum {
                    system: element.lang.unwrap_or_default(),
                    value: element.value,
                }),
                _ => {}
            }
        } else if let Some(channel) = self.channel.as_mut() {
            match name {
                "display-name" => channel.display_names.push(CommonElement {
                    value,
                    lang: qualifier,
                }),
                "url" => {
                    if !value.is_empty() {
                        channel.urls.push(value);
                    }
                }
                "lcn" => channel.lcn = value,
                _ => {}
            }
        }
    }
}

fn element_name(element: &BytesStart) -> AppResult<String> {
    std::str::from_utf8(element.name().as_ref())
        .map(str::to_string)
        .map_err(|e| parse_error(format!("Invalid UTF-8 in XML element name: {e}")))
}

/// Parse XML attributes into a HashMap, unescaping values
fn parse_attributes(element: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();

    for attr in element.attributes().flatten() {
        if let (Ok(key), Ok(value)) = (
            std::str::from_utf8(attr.key.as_ref()),
            std::str::from_utf8(&attr.value),
        ) {
            let value = quick_xml::escape::unescape(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            attrs.insert(key.to_string(), value);
        }
    }
    attrs
}

fn parse_dimension(value: Option<&String>) -> u32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

fn parse_error(message: impl Into<String>) -> crate::errors::AppError {
    SourceError::parse(SOURCE_TYPE, message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="test-grabber" source-info-name="Example">
  <channel id="bbc1.uk">
    <display-name lang="en">BBC One</display-name>
    <display-name>BBC1</display-name>
    <display-name>101</display-name>
    <icon src="http://example.com/bbc1.png" width="100" height="50"/>
    <url>http://bbc.co.uk</url>
  </channel>
  <channel id="at&amp;t.us">
    <display-name>AT &amp; T Sports</display-name>
    <lcn>7</lcn>
  </channel>
  <programme start="20240309183000 +0000" stop="20240309190000 +0000" channel="bbc1.uk">
    <title lang="en">Tom &amp; Jerry</title>
    <sub-title>The Chase</sub-title>
    <desc><![CDATA[Cat <chases> mouse]]></desc>
    <credits><actor>Somebody</actor></credits>
    <category lang="en">Animation</category>
    <episode-num system="xmltv_ns">0.4.</episode-num>
    <icon src="http://example.com/tj.png"/>
    <previously-shown/>
  </programme>
  <programme start="20240309190000 +0000" channel="at&amp;t.us">
    <title>Match</title>
    <new/>
  </programme>
</tv>"#;

    #[test]
    fn test_parse_header_attributes() {
        let tv = parse_document(SAMPLE).unwrap();
        assert_eq!(tv.generator_info_name.as_deref(), Some("test-grabber"));
        assert_eq!(tv.source_info_name.as_deref(), Some("Example"));
    }

    #[test]
    fn test_parse_channels() {
        let tv = parse_document(SAMPLE).unwrap();
        assert_eq!(tv.channels.len(), 2);

        let bbc = &tv.channels[0];
        assert_eq!(bbc.id, "bbc1.uk");
        let names: Vec<&str> = bbc.display_names.iter().map(|d| d.value.as_str()).collect();
        assert_eq!(names, vec!["BBC One", "BBC1", "101"]);
        assert_eq!(bbc.display_names[0].lang.as_deref(), Some("en"));
        assert_eq!(
            bbc.icons,
            vec![Icon {
                source: "http://example.com/bbc1.png".to_string(),
                width: 100,
                height: 50,
            }]
        );
        assert_eq!(bbc.urls, vec!["http://bbc.co.uk".to_string()]);
        assert!(bbc.lcn.is_empty());

        let att = &tv.channels[1];
        assert_eq!(att.id, "at&t.us");
        assert_eq!(att.display_names[0].value, "AT & T Sports");
        assert_eq!(att.lcn, "7");
    }

    #[test]
    fn test_parse_programmes() {
        let tv = parse_document(SAMPLE).unwrap();
        assert_eq!(tv.programmes.len(), 2);

        let first = &tv.programmes[0];
        assert_eq!(first.channel, "bbc1.uk");
        assert_eq!(first.start, "20240309183000 +0000");
        assert_eq!(first.stop.as_deref(), Some("20240309190000 +0000"));
        assert_eq!(first.title(), Some("Tom & Jerry"));
        assert_eq!(first.sub_titles[0].value, "The Chase");
        assert_eq!(first.descriptions[0].value, "Cat <chases> mouse");
        assert_eq!(first.categories[0].value, "Animation");
        assert_eq!(
            first.episode_nums,
            vec![EpisodeNum {
                system: "xmltv_ns".to_string(),
                value: "0.4.".to_string(),
            }]
        );
        assert_eq!(first.icons.len(), 1);
        assert!(first.previously_shown);
        assert!(!first.new);

        let second = &tv.programmes[1];
        assert_eq!(second.channel, "at&t.us");
        assert!(second.stop.is_none());
        assert!(second.new);
    }

    #[test]
    fn test_empty_display_name_keeps_its_slot() {
        let doc = r#"<tv><channel id="x"><display-name>X</display-name><display-name/><display-name>5</display-name></channel></tv>"#;
        let tv = parse_document(doc).unwrap();
        let names: Vec<&str> = tv.channels[0]
            .display_names
            .iter()
            .map(|d| d.value.as_str())
            .collect();
        assert_eq!(names, vec!["X", "", "5"]);
    }

    #[test]
    fn test_rejects_malformed_xml() {
        let err = parse_document("<tv><channel id=\"x\"></tv>").unwrap_err();
        assert!(err.to_string().contains("xmltv"));
    }

    #[test]
    fn test_rejects_truncated_document() {
        let truncated = &SAMPLE[..SAMPLE.find("<programme").unwrap()];
        assert!(parse_document(truncated).is_err());
    }

    #[test]
    fn test_rejects_document_without_root() {
        assert!(parse_document("").is_err());
        assert!(parse_document("<html></html>").is_err());
    }
}
