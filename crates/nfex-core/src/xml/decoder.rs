//! Streaming XML decoding into [`XmlValue`] trees using quick-xml.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::trace;

use super::{XmlValue, ATTRIBUTE_PREFIX, TEXT_KEY};
use crate::error::DecodeError;

/// An element whose end tag has not been seen yet.
struct OpenElement {
    name: String,
    entries: Vec<(String, XmlValue)>,
    text: String,
}

impl OpenElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let name = utf8(start.name().as_ref())?;
        let mut entries = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| DecodeError::Syntax {
                position: 0,
                message: e.to_string(),
            })?;
            let key = format!("{}{}", ATTRIBUTE_PREFIX, utf8(attr.key.as_ref())?);
            let value = attr.unescape_value().map_err(|e| DecodeError::Syntax {
                position: 0,
                message: e.to_string(),
            })?;
            entries.push((key, XmlValue::Text(value.into_owned())));
        }

        Ok(Self {
            name,
            entries,
            text: String::new(),
        })
    }

    fn finish(self) -> (String, XmlValue) {
        let text = self.text.trim().to_string();
        let value = match (self.entries.is_empty(), text.is_empty()) {
            (true, true) => XmlValue::Null,
            (true, false) => XmlValue::Text(text),
            (false, _) => {
                let mut entries = self.entries;
                if !text.is_empty() {
                    entries.push((TEXT_KEY.to_string(), XmlValue::Text(text)));
                }
                XmlValue::Map(entries)
            }
        };
        (self.name, value)
    }
}

/// Add a child, collapsing repeated names into a list in document order.
fn insert_child(entries: &mut Vec<(String, XmlValue)>, name: String, value: XmlValue) {
    match entries.iter_mut().find(|(k, _)| *k == name) {
        Some((_, XmlValue::List(items))) => items.push(value),
        Some((_, existing)) => {
            let first = std::mem::replace(existing, XmlValue::Null);
            *existing = XmlValue::List(vec![first, value]);
        }
        None => entries.push((name, value)),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| DecodeError::Encoding(e.to_string()))
}

/// Decode one document into a tree whose single top-level key is the root element.
pub fn parse_document(bytes: &[u8]) -> Result<XmlValue, DecodeError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<(String, XmlValue)> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| DecodeError::Syntax {
            position,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(DecodeError::TrailingContent(format!(
                        "second root element <{}>",
                        utf8(start.name().as_ref())?
                    )));
                }
                stack.push(OpenElement::from_start(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(DecodeError::TrailingContent(format!(
                        "second root element <{}>",
                        utf8(start.name().as_ref())?
                    )));
                }
                let (name, value) = OpenElement::from_start(&start)?.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.entries, name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags.
                let Some(element) = stack.pop() else {
                    return Err(DecodeError::Syntax {
                        position,
                        message: "closing tag without an open element".to_string(),
                    });
                };
                let (name, value) = element.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.entries, name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| DecodeError::Syntax {
                    position,
                    message: e.to_string(),
                })?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None if root.is_some() => {
                        return Err(DecodeError::TrailingContent(text.trim().to_string()));
                    }
                    None => {
                        return Err(DecodeError::Syntax {
                            position,
                            message: "text outside of the root element".to_string(),
                        });
                    }
                }
            }
            Event::CData(data) => {
                let text = utf8(&data.into_inner())?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&text),
                    None => return Err(DecodeError::TrailingContent(text)),
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing the tree needs.
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(DecodeError::UnexpectedEof(open.name));
    }

    let (name, value) = root.ok_or(DecodeError::NoRoot)?;
    trace!(root = %name, "decoded document");
    Ok(XmlValue::Map(vec![(name, value)]))
}
