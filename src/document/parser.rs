/*!
 * Lossless HTML parser.
 *
 * The tokenizer slices the input into comments, declarations, tags and text
 * without normalising anything; the tree builder then nests elements while
 * keeping every slice verbatim. Well-formed input is required: mismatched,
 * stray or unclosed tags are reported with their line number. Elements whose
 * end tag HTML makes optional (`p`, `li`, `td`, ...) may be closed implicitly.
 */

use log::trace;

use super::model::{Attribute, Document, Element, Node};
use crate::errors::ParseError;

/// Elements that never have content
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text up to the matching close tag
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements that may be closed implicitly by an ancestor's close tag
const OPTIONAL_END_ELEMENTS: &[&str] = &[
    "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead", "tbody", "tfoot",
    "colgroup", "rp", "rt",
];

/// Elements that may additionally be left open at end of input
const OPTIONAL_AT_EOF: &[&str] = &["html", "head", "body"];

/// Parse a complete document. The root `<html>` must declare `lang`.
pub fn parse_document(input: &str) -> Result<Document, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let nodes = parse_nodes(input)?;
    Document::from_nodes(nodes)
}

/// Parse a fragment (a sequence of sibling nodes)
pub fn parse_fragment(input: &str) -> Result<Vec<Node>, ParseError> {
    parse_nodes(input)
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Comment(&'a str),
    Declaration(&'a str),
    Open {
        name: String,
        attributes: Vec<Attribute>,
        raw: &'a str,
        self_closing: bool,
        line: usize,
    },
    Close {
        name: String,
        raw: &'a str,
        line: usize,
    },
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    /// Set after a raw-text element opens; its content is read verbatim next
    raw_text_of: Option<(String, usize)>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            raw_text_of: None,
        }
    }

    /// Move to `to`, keeping the line counter current
    fn advance(&mut self, to: usize) -> &'a str {
        let slice = &self.input[self.pos..to];
        self.line += slice.bytes().filter(|b| *b == b'\n').count();
        self.pos = to;
        slice
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        if let Some((name, open_line)) = self.raw_text_of.take() {
            let end = self.find_raw_text_end(&name).ok_or(ParseError::UnclosedElement {
                name: name.clone(),
                line: open_line,
            })?;
            if end > self.pos {
                return Ok(Some(Token::Text(self.advance(end))));
            }
        }

        if self.pos >= self.input.len() {
            return Ok(None);
        }

        let bytes = self.input.as_bytes();
        let rest = &self.input[self.pos..];
        let line = self.line;

        if rest.starts_with("<!--") {
            let end = rest[4..]
                .find("-->")
                .map(|i| self.pos + 4 + i + 3)
                .ok_or(ParseError::UnterminatedComment { line })?;
            return Ok(Some(Token::Comment(self.advance(end))));
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest
                .find('>')
                .map(|i| self.pos + i + 1)
                .ok_or(ParseError::UnterminatedTag { line })?;
            return Ok(Some(Token::Declaration(self.advance(end))));
        }

        if rest.starts_with("</") && bytes.get(self.pos + 2).is_some_and(u8::is_ascii_alphabetic) {
            let end = rest
                .find('>')
                .map(|i| self.pos + i + 1)
                .ok_or(ParseError::UnterminatedTag { line })?;
            let raw = self.advance(end);
            let name = read_name(&raw[2..]).to_ascii_lowercase();
            return Ok(Some(Token::Close { name, raw, line }));
        }

        if rest.starts_with('<') && bytes.get(self.pos + 1).is_some_and(u8::is_ascii_alphabetic) {
            let (end, name, attributes, self_closing) =
                parse_open_tag(self.input, self.pos).ok_or(ParseError::UnterminatedTag { line })?;
            let raw = self.advance(end);
            if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                self.raw_text_of = Some((name.clone(), line));
            }
            return Ok(Some(Token::Open {
                name,
                attributes,
                raw,
                self_closing,
                line,
            }));
        }

        // Text runs until the next position where markup starts
        let mut end = self.pos + 1;
        while end < bytes.len() && !markup_starts_at(bytes, end) {
            end += 1;
        }
        // `<` and `>` are ASCII, so `end` is always a char boundary here
        Ok(Some(Token::Text(self.advance(end))))
    }

    /// Byte offset of the close tag ending a raw-text element
    fn find_raw_text_end(&self, name: &str) -> Option<usize> {
        let haystack = self.input[self.pos..].to_ascii_lowercase();
        let needle = format!("</{}", name);
        let mut from = 0;
        while let Some(i) = haystack[from..].find(&needle) {
            let at = from + i;
            let after = haystack.as_bytes().get(at + needle.len());
            if matches!(after, None | Some(b'>') | Some(b'/')) || after.is_some_and(u8::is_ascii_whitespace) {
                return Some(self.pos + at);
            }
            from = at + needle.len();
        }
        None
    }
}

fn markup_starts_at(bytes: &[u8], i: usize) -> bool {
    if bytes[i] != b'<' {
        return false;
    }
    match bytes.get(i + 1) {
        Some(b'!') | Some(b'?') => true,
        Some(b'/') => bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic),
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

fn read_name(s: &str) -> &str {
    let end = s
        .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
        .unwrap_or(s.len());
    &s[..end]
}

/// Parse an open tag starting at `start` (which holds `<`).
///
/// Returns the end offset (one past `>`), the lowercased name, the attributes
/// and whether the tag is self-closing. `None` when the tag never terminates.
fn parse_open_tag(input: &str, start: usize) -> Option<(usize, String, Vec<Attribute>, bool)> {
    let bytes = input.as_bytes();
    let name = read_name(&input[start + 1..]).to_ascii_lowercase();
    let mut i = start + 1 + name.len();
    let mut attributes = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => return Some((i + 1, name, attributes, false)),
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some((i + 2, name, attributes, true));
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let attr_name = input[name_start..i].to_ascii_lowercase();

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attributes.push(Attribute {
                name: attr_name,
                value: None,
            });
            continue;
        }

        i = j + 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = match bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let close = input[i + 1..].find(*quote as char)? + i + 1;
                let value = input[i + 1..close].to_string();
                i = close + 1;
                value
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                input[value_start..i].to_string()
            }
        };
        attributes.push(Attribute {
            name: attr_name,
            value: Some(value),
        });
    }
}

/// Attach a finished node to the innermost open element or the roots
fn attach(stack: &mut [Element], roots: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn parse_nodes(input: &str) -> Result<Vec<Node>, ParseError> {
    let mut tokenizer = Tokenizer::new(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<Node> = Vec::new();

    while let Some(token) = tokenizer.next_token()? {
        match token {
            Token::Text(text) => attach(&mut stack, &mut roots, Node::Text(text.to_string())),
            Token::Comment(raw) => attach(&mut stack, &mut roots, Node::Comment(raw.to_string())),
            Token::Declaration(raw) => {
                attach(&mut stack, &mut roots, Node::Doctype(raw.to_string()))
            }
            Token::Open {
                name,
                attributes,
                raw,
                self_closing,
                line,
            } => {
                let leaf = self_closing || VOID_ELEMENTS.contains(&name.as_str());
                let element = Element {
                    name,
                    attributes,
                    open_tag: raw.to_string(),
                    close_tag: None,
                    children: Vec::new(),
                    line,
                };
                if leaf {
                    attach(&mut stack, &mut roots, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::Close { name, raw, line } => {
                let Some(index) = stack.iter().rposition(|e| e.name == name) else {
                    return Err(ParseError::UnexpectedCloseTag { name, line });
                };
                if let Some(blocking) = stack[index + 1..]
                    .iter()
                    .rev()
                    .find(|e| !OPTIONAL_END_ELEMENTS.contains(&e.name.as_str()))
                {
                    return Err(ParseError::MismatchedTag {
                        expected: blocking.name.clone(),
                        found: name,
                        line,
                    });
                }
                while stack.len() > index + 1 {
                    if let Some(implicit) = stack.pop() {
                        trace!("Implicitly closing <{}> at line {}", implicit.name, line);
                        attach(&mut stack, &mut roots, Node::Element(implicit));
                    }
                }
                if let Some(mut element) = stack.pop() {
                    element.close_tag = Some(raw.to_string());
                    attach(&mut stack, &mut roots, Node::Element(element));
                }
            }
        }
    }

    while let Some(element) = stack.pop() {
        let name = element.name.as_str();
        if !OPTIONAL_END_ELEMENTS.contains(&name) && !OPTIONAL_AT_EOF.contains(&name) {
            return Err(ParseError::UnclosedElement {
                name: element.name.clone(),
                line: element.line,
            });
        }
        attach(&mut stack, &mut roots, Node::Element(element));
    }

    Ok(roots)
}
