//! Minimal node tree used to read and write `info.xml` manifests.
//!
//! Elements keep their attributes plus an ordered list of child elements,
//! text runs and comments, so mixed content and comments survive a
//! load/save cycle. Whitespace-only text between elements is layout and is
//! not kept.

use std::{borrow::Cow, fs, path::Path, sync::OnceLock};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use regex::Regex;

use crate::error::DocumentError;

type Result<T> = std::result::Result<T, DocumentError>;

/// True when `name` is a well-formed XML element or attribute name.
pub fn is_valid_name(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| {
        let start = r":A-Z_a-z\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}\x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}\x{10000}-\x{EFFFF}";
        let rest = r"\-.0-9\x{B7}\x{300}-\x{36F}\x{203F}-\x{2040}";
        Regex::new(&format!("^[{start}][{start}{rest}]*$")).unwrap()
    });
    regex.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    nodes: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a text run; empty text adds nothing.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Sets an attribute, replacing any existing value under the same key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Appends `child` and returns a handle to it for nested building.
    pub fn push_child(&mut self, child: Element) -> &mut Element {
        self.nodes.push(Node::Element(child));
        match self.nodes.last_mut() {
            Some(Node::Element(element)) => element,
            _ => unreachable!("an element was just pushed"),
        }
    }

    /// Appends text, merging it into a directly preceding text run.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.nodes.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(&text),
            _ => self.nodes.push(Node::Text(text)),
        }
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.nodes.push(Node::Comment(comment.into()));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Direct text content with child elements skipped, or the empty string.
    pub fn text(&self) -> Cow<'_, str> {
        let mut runs = self.nodes.iter().filter_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            _ => None,
        });
        let Some(first) = runs.next() else {
            return Cow::Borrowed("");
        };
        match runs.next() {
            None => Cow::Borrowed(first),
            Some(second) => {
                let mut joined = format!("{first}{second}");
                runs.for_each(|run| joined.push_str(run));
                Cow::Owned(joined)
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().find(|child| child.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children().filter(move |child| child.name == name)
    }

    /// All descendants matching a slash-separated path relative to this node,
    /// in document order.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(vec![self], |nodes, segment| {
                nodes
                    .into_iter()
                    .flat_map(|node| node.children().filter(move |child| child.name == segment))
                    .collect()
            })
    }

    /// First node matching `path`, if any.
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    fn from_start(start: &BytesStart<'_>, position: u64) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut element = Element::new(name);
        for attr in start.attributes() {
            let attr = attr.map_err(|err| malformed(position, err))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| malformed(position, err))?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

/// A parsed manifest document with a single root element.
///
/// Comments outside the root are kept on either side of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
    leading_comments: Vec<String>,
    trailing_comments: Vec<String>,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            root,
            leading_comments: Vec::new(),
            trailing_comments: Vec::new(),
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let xml = self.to_xml_string()?;
        fs::write(path, xml).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut reader = Reader::from_str(input);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut leading_comments = Vec::new();
        let mut trailing_comments = Vec::new();
        loop {
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event()
                .map_err(|err| malformed(position, err))?;
            match event {
                Event::Start(start) => stack.push(Element::from_start(&start, position)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start, position)?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed(position, "unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|err| malformed(position, err))?;
                    push_text(&mut stack, &value, position)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    push_text(&mut stack, &value, position)?;
                }
                Event::Comment(comment) => {
                    let value = String::from_utf8_lossy(&comment).into_owned();
                    match (stack.last_mut(), &root) {
                        (Some(parent), _) => parent.push_comment(value),
                        (None, None) => leading_comments.push(value),
                        (None, Some(_)) => trailing_comments.push(value),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let position = reader.buffer_position() as u64;
        if let Some(open) = stack.last() {
            return Err(malformed(
                position,
                format!("element `{}` is never closed", open.name),
            ));
        }
        let root = root.ok_or_else(|| malformed(position, "document has no root element"))?;
        Ok(Self {
            root,
            leading_comments,
            trailing_comments,
        })
    }

    /// Renders the tree with an XML declaration and two-space indentation.
    ///
    /// Fails on element or attribute names that are not valid XML names and
    /// on comments that cannot be written back, so the output always parses.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        for comment in &self.leading_comments {
            write_comment(&mut writer, comment)?;
        }
        write_element(&mut writer, &self.root)?;
        for comment in &self.trailing_comments {
            write_comment(&mut writer, comment)?;
        }
        let mut xml = String::from_utf8(writer.into_inner()).map_err(write_error)?;
        xml.push('\n');
        Ok(xml)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.nodes.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(malformed(position, "document has more than one root element"));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], value: &str, position: u64) -> Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => {
            parent.push_text(value);
            Ok(())
        }
        None => Err(malformed(position, "text outside of the root element")),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    check_name(&element.name)?;
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        check_name(key)?;
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.nodes.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for node in &element.nodes {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?,
            Node::Comment(comment) => write_comment(writer, comment)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

fn write_comment(writer: &mut Writer<Vec<u8>>, comment: &str) -> Result<()> {
    if comment.contains("--") || comment.ends_with('-') {
        return Err(write_error(format!(
            "comment `{comment}` cannot contain `--` or end with `-`"
        )));
    }
    writer
        .write_event(Event::Comment(BytesText::from_escaped(comment)))
        .map_err(write_error)
}

fn check_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(write_error(format!("`{name}` is not a valid XML name")))
    }
}

fn malformed(position: u64, err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Malformed {
        position,
        message: err.to_string(),
    }
}

fn write_error(err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Write {
        message: err.to_string(),
    }
}
