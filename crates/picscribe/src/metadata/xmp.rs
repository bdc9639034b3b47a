//! Minimal XMP packet writer and reader for the description fields.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::MetadataError;

/// Fields written into every packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmpFields<'a> {
    pub description: &'a str,
    pub subject: &'a str,
    pub creator_tool: &'a str,
}

pub fn build_packet(fields: &XmpFields<'_>) -> String {
    format!(
        concat!(
            "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n",
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n",
            " <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
            "  <rdf:Description rdf:about=\"\"\n",
            "    xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n",
            "    xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\">\n",
            "   <dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:description>\n",
            "   <dc:subject><rdf:Bag><rdf:li>{}</rdf:li></rdf:Bag></dc:subject>\n",
            "   <xmp:CreatorTool>{}</xmp:CreatorTool>\n",
            "  </rdf:Description>\n",
            " </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end=\"w\"?>"
        ),
        escape(fields.description),
        escape(fields.subject),
        escape(fields.creator_tool),
    )
}

/// Returns the first `dc:description` entry of a packet, if there is one.
pub fn parse_description(packet: &str) -> Result<Option<String>, MetadataError> {
    let mut reader = Reader::from_str(packet);

    let mut in_description = false;
    let mut in_item = false;
    let mut raw = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"dc:description" => in_description = true,
                b"rdf:li" if in_description => in_item = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"rdf:li" if in_item => {
                    let text = unescape(&raw).map_err(|e| MetadataError::Xmp(e.to_string()))?;
                    return Ok(Some(text.into_owned()));
                }
                b"dc:description" => in_description = false,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_item => {
                raw.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(ref e)) if in_item => {
                raw.push('&');
                raw.push_str(&String::from_utf8_lossy(e.as_ref()));
                raw.push(';');
            }
            Ok(Event::CData(ref e)) if in_item => {
                raw.push_str(&escape(String::from_utf8_lossy(e.as_ref()).as_ref()));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(MetadataError::Xmp(e.to_string())),
            _ => {}
        }
    }
}
