// SPDX-License-Identifier: MIT
//! Attribute tree over the XML payload
//!
//! A small element tree built from quick-xml events. Parsing keeps element
//! names, attributes (in document order) and non-blank text; comments and
//! processing instructions are dropped. Printing is not byte-stable with
//! respect to the parsed input.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{FxpError, Result};

/// `<?xml ...?>` declaration values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace an attribute in place, or append it when absent
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr.unescape_value()?.to_string();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        if let Some(text) = &self.text {
            write_event(writer, Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

/// A parsed XML document with a single root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    pub declaration: Option<XmlDeclaration>,
    pub root: XmlElement,
}

impl XmlTree {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FxpError::MalformedXml(format!("payload is not UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Decl(ref d) => {
                    declaration = Some(XmlDeclaration {
                        version: String::from_utf8_lossy(&d.version()?).to_string(),
                        encoding: d
                            .encoding()
                            .transpose()?
                            .map(|e| String::from_utf8_lossy(&e).to_string()),
                        standalone: d
                            .standalone()
                            .transpose()?
                            .map(|s| String::from_utf8_lossy(&s).to_string()),
                    });
                }
                Event::Start(ref e) => stack.push(XmlElement::from_start(e)?),
                Event::Empty(ref e) => {
                    let element = XmlElement::from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        FxpError::MalformedXml("unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref t) => {
                    if let Some(current) = stack.last_mut() {
                        let text = t.unescape()?;
                        if !text.trim().is_empty() {
                            current.text.get_or_insert_with(String::new).push_str(&text);
                        }
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&c.into_inner()).to_string();
                        current.text.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(FxpError::MalformedXml(format!(
                "unclosed element <{}>",
                open.name
            )));
        }

        let root =
            root.ok_or_else(|| FxpError::MalformedXml("document has no root element".into()))?;
        Ok(Self { declaration, root })
    }

    /// Print the tree back to bytes
    pub fn print(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        if let Some(decl) = &self.declaration {
            write_event(
                &mut writer,
                Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )),
            )?;
        }
        self.root.write_into(&mut writer)?;
        Ok(writer.into_inner())
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(FxpError::MalformedXml(format!(
                "second root element <{}>",
                element.name
            )))
        }
    }
    Ok(())
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| FxpError::MalformedXml(format!("failed to print XML: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<patch revision="16">
  <meta name="Lead1" category="Leads" comment="" author="x"/>
  <parameters>
    <cutoff type="2" value="0.5"/>
    <resonance type="2" value="0.1"/>
  </parameters>
</patch>"#;

    #[test]
    fn test_parse_tree() {
        let tree = XmlTree::parse(PATCH).unwrap();
        let decl = tree.declaration.as_ref().unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));

        assert_eq!(tree.root.name, "patch");
        assert_eq!(tree.root.attribute("revision"), Some("16"));

        let meta = tree.root.child("meta").unwrap();
        assert_eq!(meta.attribute("name"), Some("Lead1"));
        assert_eq!(meta.attribute("comment"), Some(""));

        let params = tree.root.child("parameters").unwrap();
        let names: Vec<_> = params.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cutoff", "resonance"]);
    }

    #[test]
    fn test_print_reparses_to_same_tree() {
        let tree = XmlTree::parse(PATCH).unwrap();
        let printed = tree.print().unwrap();
        assert!(printed.starts_with(b"<?xml"));
        assert_eq!(XmlTree::parse(&printed).unwrap(), tree);
    }

    #[test]
    fn test_escaped_attributes() {
        let tree = XmlTree::parse(br#"<patch><meta comment="a &amp; b &lt;c&gt;"/></patch>"#)
            .unwrap();
        let meta = tree.root.child("meta").unwrap();
        assert_eq!(meta.attribute("comment"), Some("a & b <c>"));

        let printed = tree.print().unwrap();
        assert_eq!(XmlTree::parse(&printed).unwrap(), tree);
    }

    #[test]
    fn test_set_attribute() {
        let mut element = XmlElement::new("cutoff");
        element.set_attribute("value", "0.1");
        element.set_attribute("type", "2");
        element.set_attribute("value", "0.9");
        assert_eq!(
            element.attributes,
            vec![
                ("value".to_string(), "0.9".to_string()),
                ("type".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_inputs() {
        for input in [
            &b""[..],
            b"<?xml version=\"1.0\"?>",
            b"<patch><meta></patch>",
            b"<patch>",
            b"<a/><b/>",
            b"\xff\xfe<patch/>",
        ] {
            assert!(
                matches!(XmlTree::parse(input), Err(FxpError::MalformedXml(_))),
                "{:?}",
                String::from_utf8_lossy(input)
            );
        }
    }
}
