/*!
 * In-memory HTML document model.
 *
 * Every node keeps the exact source text it was parsed from (open tag, close
 * tag, raw text), so serialising an untouched tree reproduces the input
 * byte-for-byte. A `Document` is never mutated after parsing; output documents
 * are built as new trees.
 */

use std::fmt;

use crate::errors::ParseError;

/// Languages written right-to-left, by primary subtag
const RTL_LANGUAGES: &[&str] = &["ar", "dv", "fa", "he", "iw", "ps", "sd", "ug", "ur", "yi"];

/// Discriminant of a [`Node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Doctype,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Element => write!(f, "element"),
            NodeKind::Text => write!(f, "text"),
            NodeKind::Comment => write!(f, "comment"),
            NodeKind::Doctype => write!(f, "doctype"),
        }
    }
}

/// A single attribute, kept in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name
    pub name: String,
    /// Raw value without surrounding quotes, `None` for bare attributes
    pub value: Option<String>,
}

/// An element and its subtree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// Exact open tag text, including `<` and `>`
    pub open_tag: String,
    /// Exact close tag text; `None` for void, self-closing or implicitly closed elements
    pub close_tag: Option<String>,
    /// Child nodes in document order
    pub children: Vec<Node>,
    /// 1-based source line of the open tag
    pub line: usize,
}

impl Element {
    /// Value of an attribute; bare attributes yield an empty string
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    /// Whether the `class` attribute lists the given class
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Concatenated raw text of all descendant text nodes
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialise this element and its subtree
    pub fn write_html(&self, out: &mut String) {
        out.push_str(&self.open_tag);
        for child in &self.children {
            child.write_html(out);
        }
        if let Some(close) = &self.close_tag {
            out.push_str(close);
        }
    }

    /// Copy of this element with one attribute set, regenerating its open tag.
    ///
    /// Only the open tag of this element changes; children and the close tag
    /// are kept as they are.
    pub fn with_attribute(&self, name: &str, value: &str) -> Element {
        let mut attributes = self.attributes.clone();
        match attributes.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.value = Some(value.to_string()),
            None => attributes.push(Attribute {
                name: name.to_ascii_lowercase(),
                value: Some(value.to_string()),
            }),
        }

        let mut open_tag = format!("<{}", self.tag_name_as_written());
        for attr in &attributes {
            open_tag.push(' ');
            open_tag.push_str(&attr.name);
            if let Some(v) = &attr.value {
                open_tag.push_str("=\"");
                open_tag.push_str(&v.replace('"', "&quot;"));
                open_tag.push('"');
            }
        }
        if self.open_tag.trim_end_matches('>').trim_end().ends_with('/') {
            open_tag.push_str(" /");
        }
        open_tag.push('>');

        Element {
            attributes,
            open_tag,
            ..self.clone()
        }
    }

    /// Tag name with its original casing, as it appears in the open tag
    fn tag_name_as_written(&self) -> &str {
        let after = &self.open_tag[1..];
        let end = after
            .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
            .unwrap_or(after.len());
        &after[..end]
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) | Node::Doctype(_) => {}
        }
    }
}

/// A document node. The set of kinds is closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Raw text, entities left undecoded
    Text(String),
    /// Raw comment including `<!--` and `-->`
    Comment(String),
    /// Raw declaration (`<!DOCTYPE ...>`, `<?xml ...?>`)
    Doctype(String),
}

impl Node {
    /// The kind of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Element(_) => NodeKind::Element,
            Node::Text(_) => NodeKind::Text,
            Node::Comment(_) => NodeKind::Comment,
            Node::Doctype(_) => NodeKind::Doctype,
        }
    }

    /// Element payload, if this node is an element
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Serialise this node
    pub fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_html(out),
            Node::Text(raw) | Node::Comment(raw) | Node::Doctype(raw) => out.push_str(raw),
        }
    }

    /// Serialise this node into a new string
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }
}

/// Text direction of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
    Auto,
}

impl Direction {
    /// Natural direction for a language tag such as `he` or `ar-EG`
    pub fn for_language(language: &str) -> Self {
        let primary = language
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if RTL_LANGUAGES.contains(&primary.as_str()) {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }

    /// Parse a `dir` attribute value
    pub fn from_attr(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Some(Direction::Ltr),
            "rtl" => Some(Direction::Rtl),
            "auto" => Some(Direction::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ltr => write!(f, "ltr"),
            Direction::Rtl => write!(f, "rtl"),
            Direction::Auto => write!(f, "auto"),
        }
    }
}

/// Metadata read from the document head
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    /// Trimmed text of `<title>`, if any
    pub title: Option<String>,
    /// Language declared on `<html lang>`
    pub language: String,
    /// Declared `dir`, or the language's natural direction
    pub direction: Direction,
}

/// A parsed HTML document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    metadata: DocumentMetadata,
}

impl Document {
    /// Parse a complete document
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        super::parser::parse_document(input)
    }

    /// Build a document from top-level nodes, reading its metadata.
    ///
    /// Fails with `MissingLanguage` when there is no `<html>` element or it
    /// carries no non-empty `lang` attribute.
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, ParseError> {
        let root = nodes
            .iter()
            .filter_map(Node::as_element)
            .find(|e| e.name == "html")
            .ok_or(ParseError::MissingLanguage)?;

        let language = root
            .attr("lang")
            .or_else(|| root.attr("xml:lang"))
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(ParseError::MissingLanguage)?
            .to_string();

        let direction = root
            .attr("dir")
            .and_then(Direction::from_attr)
            .unwrap_or_else(|| Direction::for_language(&language));

        let title = find_element(&nodes, "title")
            .map(|t| t.text_content().trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            nodes,
            metadata: DocumentMetadata {
                title,
                language,
                direction,
            },
        })
    }

    /// Top-level nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Document metadata
    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// The `<html>` element
    pub fn root_element(&self) -> Option<&Element> {
        self.nodes
            .iter()
            .filter_map(Node::as_element)
            .find(|e| e.name == "html")
    }

    /// First element with the given name, in document order
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        find_element(&self.nodes, name)
    }

    /// Serialise the document
    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(4096);
        for node in &self.nodes {
            node.write_html(&mut out);
        }
        out
    }
}

fn find_element<'a>(nodes: &'a [Node], name: &str) -> Option<&'a Element> {
    for node in nodes {
        if let Node::Element(element) = node {
            if element.name == name {
                return Some(element);
            }
            if let Some(found) = find_element(&element.children, name) {
                return Some(found);
            }
        }
    }
    None
}
