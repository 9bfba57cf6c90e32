//! Generic XML element tree
//!
//! Feeds are first read into an untyped tree so RSS 2.0 and RSS 1.0/RDF
//! documents can be told apart structurally before any field is extracted.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{Error, Result};

/// Namespace prefixes kept verbatim on element names; every other prefix is stripped
const PRESERVED_PREFIXES: &[&str] = &["rdf", "dc", "syn"];

/// A parsed XML element with its attributes, character data and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated text and CDATA content, trimmed
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Strip a namespace prefix from a tag name unless it is one of the preserved ones
pub fn normalize_name(raw: &str) -> String {
    match raw.split_once(':') {
        Some((prefix, _)) if PRESERVED_PREFIXES.contains(&prefix) => raw.to_string(),
        Some((_, local)) => local.to_string(),
        None => raw.to_string(),
    }
}

/// Parse a complete XML document into its root element
pub fn parse_xml(content: &str) -> Result<XmlElement> {
    // Text is kept as written and only trimmed at element boundaries, so
    // whitespace between text, CDATA and comments survives
    let mut reader = Reader::from_str(content);

    // Open elements paired with their raw (unstripped) tag names for end-tag matching
    let mut stack: Vec<(String, XmlElement)> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                ensure_single_root(&stack, &root)?;
                let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let element = open_element(&e, &reader)?;
                stack.push((raw_name, element));
            }
            Ok(Event::Empty(e)) => {
                ensure_single_root(&stack, &root)?;
                let element = open_element(&e, &reader)?;
                close_element(element, &mut stack, &mut root);
            }
            Ok(Event::End(e)) => {
                let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match stack.pop() {
                    Some((open, element)) if open == raw_name => {
                        close_element(element, &mut stack, &mut root);
                    }
                    Some((open, _)) => {
                        return Err(Error::Parse(format!(
                            "Mismatched closing tag `</{}>`, expected `</{}>`",
                            raw_name, open
                        )));
                    }
                    None => {
                        return Err(Error::Parse(format!(
                            "Unexpected closing tag `</{}>`",
                            raw_name
                        )));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| {
                    Error::Parse(format!(
                        "Invalid text at position {}: {}",
                        reader.buffer_position(),
                        err
                    ))
                })?;
                append_text(&mut stack, &text)?;
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                append_text(&mut stack, &text)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Parse(format!(
                    "Malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            // Declarations, comments, processing instructions and doctypes carry no feed data
            Ok(_) => {}
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(Error::Parse(format!(
            "Unexpected end of document, `<{}>` is not closed",
            open
        )));
    }

    root.ok_or_else(|| Error::Parse("Document has no root element".to_string()))
}

fn ensure_single_root(stack: &[(String, XmlElement)], root: &Option<XmlElement>) -> Result<()> {
    if stack.is_empty() && root.is_some() {
        return Err(Error::Parse(
            "Document has more than one root element".to_string(),
        ));
    }
    Ok(())
}

fn open_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<XmlElement> {
    let name = normalize_name(&String::from_utf8_lossy(e.name().as_ref()));

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            Error::Parse(format!("Malformed attribute on `<{}>`: {}", name, err))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| {
                Error::Parse(format!("Invalid value for attribute `{}`: {}", key, err))
            })?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        ..Default::default()
    })
}

fn close_element(
    mut element: XmlElement,
    stack: &mut [(String, XmlElement)],
    root: &mut Option<XmlElement>,
) {
    element.text = element.text.trim().to_string();
    match stack.last_mut() {
        Some((_, parent)) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn append_text(stack: &mut [(String, XmlElement)], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some((_, element)) => {
            element.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::Parse(
            "Text content outside of the root element".to_string(),
        )),
    }
}
