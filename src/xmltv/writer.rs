//! XMLTV document writer

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::{Channel, CommonElement, EpisodeNum, Icon, Programme, Tv};
use crate::errors::{AppError, AppResult};

/// Render a complete XMLTV document, channels first then programmes
pub fn write_document(tv: &Tv) -> AppResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new("tv");
    if let Some(generator) = &tv.generator_info_name {
        root.push_attribute(("generator-info-name", generator.as_str()));
    }
    if let Some(source) = &tv.source_info_name {
        root.push_attribute(("source-info-name", source.as_str()));
    }
    emit(&mut writer, Event::Start(root))?;

    for channel in &tv.channels {
        write_channel(&mut writer, channel)?;
    }
    for programme in &tv.programmes {
        write_programme(&mut writer, programme)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("tv")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::internal(format!("XMLTV output is not UTF-8: {e}")))
}

fn write_channel(writer: &mut Writer<Vec<u8>>, channel: &Channel) -> AppResult<()> {
    let mut start = BytesStart::new("channel");
    start.push_attribute(("id", channel.id.as_str()));
    emit(writer, Event::Start(start))?;

    // Every display-name is written, empty ones included, so positional
    // consumers see the same slots the channel was built with.
    for name in &channel.display_names {
        write_common(writer, "display-name", name)?;
    }
    for icon in &channel.icons {
        write_icon(writer, icon)?;
    }
    for url in &channel.urls {
        write_text(writer, "url", &[], url)?;
    }
    if !channel.lcn.is_empty() {
        write_text(writer, "lcn", &[], &channel.lcn)?;
    }

    emit(writer, Event::End(BytesEnd::new("channel")))
}

fn write_programme(writer: &mut Writer<Vec<u8>>, programme: &Programme) -> AppResult<()> {
    let mut start = BytesStart::new("programme");
    start.push_attribute(("start", programme.start.as_str()));
    if let Some(stop) = &programme.stop {
        start.push_attribute(("stop", stop.as_str()));
    }
    start.push_attribute(("channel", programme.channel.as_str()));
    emit(writer, Event::Start(start))?;

    for title in &programme.titles {
        write_common(writer, "title", title)?;
    }
    for sub_title in &programme.sub_titles {
        write_common(writer, "sub-title", sub_title)?;
    }
    for desc in &programme.descriptions {
        write_common(writer, "desc", desc)?;
    }
    for category in &programme.categories {
        write_common(writer, "category", category)?;
    }
    for icon in &programme.icons {
        write_icon(writer, icon)?;
    }
    for EpisodeNum { system, value } in &programme.episode_nums {
        if system.is_empty() {
            write_text(writer, "episode-num", &[], value)?;
        } else {
            write_text(writer, "episode-num", &[("system", system.as_str())], value)?;
        }
    }
    if programme.previously_shown {
        emit(writer, Event::Empty(BytesStart::new("previously-shown")))?;
    }
    if programme.new {
        emit(writer, Event::Empty(BytesStart::new("new")))?;
    }

    emit(writer, Event::End(BytesEnd::new("programme")))
}

fn write_common(writer: &mut Writer<Vec<u8>>, tag: &str, element: &CommonElement) -> AppResult<()> {
    match &element.lang {
        Some(lang) => write_text(writer, tag, &[("lang", lang.as_str())], &element.value),
        None => write_text(writer, tag, &[], &element.value),
    }
}

fn write_icon(writer: &mut Writer<Vec<u8>>, icon: &Icon) -> AppResult<()> {
    let mut start = BytesStart::new("icon");
    start.push_attribute(("src", icon.source.as_str()));
    if icon.width > 0 {
        start.push_attribute(("width", icon.width.to_string().as_str()));
    }
    if icon.height > 0 {
        start.push_attribute(("height", icon.height.to_string().as_str()));
    }
    emit(writer, Event::Empty(start))
}

fn write_text(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    attrs: &[(&str, &str)],
    value: &str,
) -> AppResult<()> {
    let mut start = BytesStart::new(tag);
    for attr in attrs {
        start.push_attribute(*attr);
    }

    if value.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> AppResult<()> {
    writer
        .write_event(event)
        .map_err(|e| AppError::internal(format!("Failed to write XMLTV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltv::parse_document;

    fn sample_tv() -> Tv {
        Tv {
            generator_info_name: Some("guide-providers".to_string()),
            source_info_name: None,
            channels: vec![Channel {
                id: "espn.us".to_string(),
                display_names: vec![
                    CommonElement::new("ESPN"),
                    CommonElement::new(""),
                    CommonElement::new("206"),
                ],
                icons: vec![Icon {
                    source: "http://example.com/espn.png".to_string(),
                    width: 360,
                    height: 270,
                }],
                urls: vec!["http://espn.com".to_string()],
                lcn: "206".to_string(),
            }],
            programmes: vec![Programme {
                channel: "espn.us".to_string(),
                start: "20240309183000 +0000".to_string(),
                stop: Some("20240309190000 +0000".to_string()),
                titles: vec![CommonElement {
                    value: "Q&A <Live>".to_string(),
                    lang: Some("en".to_string()),
                }],
                episode_nums: vec![EpisodeNum {
                    system: "dd_progid".to_string(),
                    value: "EP012345.0001".to_string(),
                }],
                new: true,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_writes_header_and_escapes_text() {
        let xml = write_document(&sample_tv()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<tv generator-info-name=\"guide-providers\">"));
        assert!(xml.contains("Q&amp;A &lt;Live&gt;"));
        assert!(xml.contains("<icon src=\"http://example.com/espn.png\" width=\"360\" height=\"270\"/>"));
        assert!(xml.contains("<new/>"));
    }

    #[test]
    fn test_written_document_reads_back() {
        let tv = sample_tv();
        let xml = write_document(&tv).unwrap();
        let parsed = parse_document(&xml).unwrap();
        assert_eq!(parsed, tv);
    }

    #[test]
    fn test_empty_document() {
        let xml = write_document(&Tv::default()).unwrap();
        let parsed = parse_document(&xml).unwrap();
        assert!(parsed.channels.is_empty());
        assert!(parsed.programmes.is_empty());
    }
}
