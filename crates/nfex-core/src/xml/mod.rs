//! Generic XML tree used as the intermediate form of every document.
//!
//! The tree mirrors the usual "XML as nested mappings" convention:
//! - an element with only text becomes [`XmlValue::Text`];
//! - an empty element becomes [`XmlValue::Null`];
//! - an element with children or attributes becomes [`XmlValue::Map`],
//!   with attributes under `@name` and mixed text under `#text`;
//! - repeated child names collapse into [`XmlValue::List`].
//!
//! Maps keep document order and element names keep their namespace prefix.

mod decoder;

pub use decoder::parse_document;

/// Key under which an element's text is stored when it also has children.
pub const TEXT_KEY: &str = "#text";

/// Prefix of attribute keys.
pub const ATTRIBUTE_PREFIX: char = '@';

/// A decoded XML node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    /// Empty element.
    Null,
    /// Text-only element.
    Text(String),
    /// Element with children and/or attributes, in document order.
    Map(Vec<(String, XmlValue)>),
    /// Repeated sibling elements sharing one name.
    List(Vec<XmlValue>),
}

impl XmlValue {
    /// Look up a direct child by name.
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        match self {
            XmlValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Follow a path of child names.
    pub fn path(&self, keys: &[&str]) -> Option<&XmlValue> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Whether this node has a direct child with the given name.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Text content of a leaf, or the `#text` of an element with attributes.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlValue::Text(text) => Some(text),
            XmlValue::Map(_) => self.get(TEXT_KEY).and_then(XmlValue::as_text),
            _ => None,
        }
    }

    /// Child names in document order (empty for non-map nodes).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let entries: &[(String, XmlValue)] = match self {
            XmlValue::Map(entries) => entries.as_slice(),
            _ => &[],
        };
        entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_map(&self) -> bool {
        matches!(self, XmlValue::Map(_))
    }

    /// Short description of the node kind for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            XmlValue::Null => "empty element",
            XmlValue::Text(_) => "text",
            XmlValue::Map(_) => "element",
            XmlValue::List(_) => "repeated element",
        }
    }
}
