//! Minimal XML element tree for configuration documents.
//!
//! Only what the setting values need is exposed: named children, text and
//! attributes. Parsing and writing go through `quick-xml`.

use std::fmt;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml parse failed: {0}")]
    Parse(String),
    #[error("xml write failed: {0}")]
    Write(String),
    #[error("document has no root element")]
    MissingRoot,
    #[error("document has more than one root element")]
    MultipleRoots,
    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First child with the given name.
    pub fn get_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.add_child(child);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing any existing value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Parses a document and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlElement, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let mut element = stack.pop().ok_or_else(|| {
                        XmlError::Parse("closing tag without matching start".to_string())
                    })?;
                    if !element.children.is_empty()
                        && element.text.as_deref().is_some_and(|t| t.trim().is_empty())
                    {
                        element.text = None;
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| XmlError::Parse(format!("{e}")))?;
                    push_text(&mut stack, &text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|e| XmlError::Parse(format!("{e}")))?;
                    push_text(&mut stack, &text);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XmlError::Parse(format!("{e}"))),
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }
        root.ok_or(XmlError::MissingRoot)
    }

    /// Writes this element and its subtree as an indented document.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(format!("{e}")))
    }
}

// Text may be a hand-edited plaintext secret, so only its size is shown.
impl fmt::Debug for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlElement")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("text_len", &self.text.as_ref().map(String::len))
            .field("children", &self.children)
            .finish()
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|e| XmlError::Parse(format!("{e}")))?;
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(format!("{e}")))?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())
            .map_err(|e| XmlError::Parse(format!("{e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(format!("{e}")))?;
        element.set_attribute(key, value.into_owned());
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::MultipleRoots);
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if text.is_none() && element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| XmlError::Write(format!("{e}")));
    }

    writer
        .write_event(Event::Start(start.borrow()))
        .map_err(|e| XmlError::Write(format!("{e}")))?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| XmlError::Write(format!("{e}")))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(start.to_end()))
        .map_err(|e| XmlError::Write(format!("{e}")))
}
