//! Minimal element tree over `quick-xml` events.
//!
//! Doxygen files are small enough to hold in memory, and member types use
//! mixed content (`const <ref>Vec3</ref> &amp;`), so a tree with text nodes
//! is easier to query than the raw event stream.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated text content of this element and its descendants.
    pub fn text(&self) -> String {
        self.text_with(&|_| None)
    }

    /// Like [`text`](Self::text), but `substitute` may replace the text of
    /// any descendant element.
    pub fn text_with(&self, substitute: &dyn Fn(&Element) -> Option<String>) -> String {
        let mut out = String::new();
        self.collect_text(substitute, &mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, substitute: &dyn Fn(&Element) -> Option<String>, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(e) => match substitute(e) {
                    Some(replacement) => out.push_str(&replacement),
                    None => e.collect_text(substitute, out),
                },
            }
        }
    }

    /// Text of a named child, or `None` when the child is missing or blank.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(Element::text)
            .filter(|t| !t.is_empty())
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Parse a document and return its root element.
pub(crate) fn parse(text: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from(&start)?),
            Ok(Event::Empty(start)) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(text)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!("at byte {}: {e}", reader.buffer_position()));
            }
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element `{}`", stack[stack.len() - 1].name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_content_text() {
        let root = parse(
            r#"<memberdef kind="function"><type>const <ref refid="classosg_1_1Vec3f">Vec3f</ref> &amp;</type></memberdef>"#,
        )
        .unwrap();
        assert_eq!(root.attr("kind"), Some("function"));
        let ty = root.child("type").unwrap();
        assert_eq!(ty.text(), "const Vec3f &");

        let qualified = ty.text_with(&|e| {
            (e.name == "ref").then(|| "osg::Vec3f".to_string())
        });
        assert_eq!(qualified, "const osg::Vec3f &");
    }

    #[test]
    fn test_empty_elements_and_entities() {
        let root = parse(
            r#"<?xml version="1.0"?><a><b x="1 &lt; 2"/><c>std::vector&lt; int &gt;</c></a>"#,
        )
        .unwrap();
        assert_eq!(root.child("b").unwrap().attr("x"), Some("1 < 2"));
        assert_eq!(root.child_text("c").as_deref(), Some("std::vector< int >"));
        assert_eq!(root.child_text("missing"), None);
    }

    #[test]
    fn test_child_outlives_name() {
        let root = parse(r#"<a><compoundname>osg::Node</compoundname></a>"#).unwrap();
        let found = {
            let name = format!("compound{}", "name");
            root.child(&name)
        };
        assert_eq!(found.map(Element::text).as_deref(), Some("osg::Node"));
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("").is_err());
    }
}
