//! RSS 2.0 export of the delivered stories.

use crate::config::FeedExportConfig;
use crate::models::AdmittedItem;
use crate::outputs::unique_items;
use crate::utils::brief;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{self, Write};

const DESCRIPTION_LEN: usize = 180;

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: Write>(w: &mut Writer<W>, item: &AdmittedItem) -> io::Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(w, "title", item.title())?;
    write_text_element(w, "link", item.link())?;
    write_text_element(w, "description", &brief(item.body(), DESCRIPTION_LEN))?;
    write_text_element(w, "category", item.category().as_str())?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    w.write_event(Event::Start(guid))?;
    w.write_event(Event::Text(BytesText::new(item.key.as_str())))?;
    w.write_event(Event::End(BytesEnd::new("guid")))?;

    write_text_element(w, "pubDate", &item.timestamp().to_rfc2822())?;
    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// Render the whole channel as an indented XML document.
pub fn render_feed(items: &[AdmittedItem], config: &FeedExportConfig) -> io::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    write_text_element(&mut writer, "title", &config.title)?;
    write_text_element(&mut writer, "link", &config.link)?;
    write_text_element(&mut writer, "description", &config.description)?;

    for item in unique_items(items) {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
