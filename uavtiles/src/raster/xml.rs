//! Minimal element tree over `quick-xml` events.
//!
//! VRT files and GDAL metadata blocks are small, so they are loaded whole and
//! queried by element name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of a named child.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }
}

fn start_node(start: &BytesStart<'_>) -> Result<XmlNode, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode {
        name,
        attrs,
        ..XmlNode::default()
    })
}

/// Parse a document and return its root element.
pub fn parse(text: &str) -> Result<XmlNode, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Start(start) => stack.push(start_node(&start)?),
            Event::Empty(start) => {
                let node = start_node(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or("unbalanced closing tag")?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let doc = parse(
            r#"<?xml version="1.0"?>
            <Root a="1"><Item name="x">one &amp; two</Item><Empty flag="yes"/><Item name="y"><![CDATA[<raw>]]></Item></Root>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "Root");
        assert_eq!(doc.attr("a"), Some("1"));
        let items: Vec<_> = doc.children_named("Item").collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "one & two");
        assert_eq!(items[1].text, "<raw>");
        assert_eq!(doc.child("Empty").and_then(|e| e.attr("flag")), Some("yes"));
    }

    #[test]
    fn test_unclosed_element() {
        assert!(parse("<Root><Child></Root>").is_err());
        assert!(parse("<Root>").is_err());
    }
}
