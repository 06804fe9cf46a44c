/*!
 * Structural chunker.
 *
 * Walks a parsed document in order and turns its translatable text into
 * units without ever cutting through markup:
 *
 * - Sibling text nodes and inline elements form a *run*; blocks, comments and
 *   skipped elements end it.
 * - Inline markup inside a run is encoded as placeholder tags.
 * - Runs inside widget containers, or too short to be worth splitting, become
 *   one atomic unit.
 * - Longer runs are cut at paragraph, sentence or whitespace boundaries that
 *   lie outside every inline element, aiming for `max_unit_chars`. When no
 *   legal point exists inside the budget the cut moves to the next legal point.
 *
 * The walk is deterministic: the same document and configuration always give
 * the same runs, units and ids.
 */

use std::ops::Range;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::placeholders::{self, PlaceholderKind, PlaceholderTable};
use super::unit::{Unit, UnitKind, UnitPosition};
use crate::document::parser::{RAW_TEXT_ELEMENTS, VOID_ELEMENTS};
use crate::document::{Document, Element, Node};
use crate::language_utils::language_codes_match;

/// Characters that end a sentence
const SENTENCE_TERMINALS: &[char] = &['.', '!', '?', '…', '。', '！', '？', '؟', '׃'];

/// Closing quotes and brackets allowed between a terminal and the following space
const SENTENCE_CLOSERS: &[char] = &['"', '\'', '”', '’', '»', ')', ']'];

/// Terminals after which a cut is legal even without a following space
const FULLWIDTH_TERMINALS: &[char] = &['。', '！', '？'];

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target maximum size of a fragment, in characters of encoded text
    #[serde(default = "default_max_unit_chars")]
    pub max_unit_chars: usize,

    /// Runs with less visible text than this are never split
    #[serde(default = "default_min_split_chars")]
    pub min_split_chars: usize,

    /// Elements that continue a run instead of ending it
    #[serde(default = "default_inline_elements")]
    pub inline_elements: Vec<String>,

    /// Elements copied verbatim and never translated
    #[serde(default = "default_skip_elements")]
    pub skip_elements: Vec<String>,

    /// Interactive containers whose runs are always atomic
    #[serde(default = "default_atomic_elements")]
    pub atomic_elements: Vec<String>,

    /// Classes that mark an element as an interactive container
    #[serde(default = "default_atomic_classes")]
    pub atomic_classes: Vec<String>,

    /// Classes that mark an element as not to be translated
    #[serde(default = "default_no_translate_classes")]
    pub no_translate_classes: Vec<String>,

    /// Keep elements whose `lang` differs from the document language untouched
    #[serde(default = "default_true")]
    pub preserve_foreign_language: bool,
}

fn default_max_unit_chars() -> usize {
    2000
}

fn default_min_split_chars() -> usize {
    120
}

fn default_true() -> bool {
    true
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_inline_elements() -> Vec<String> {
    to_strings(&[
        "a", "abbr", "b", "bdi", "bdo", "big", "br", "cite", "code", "data", "del", "dfn", "em",
        "font", "i", "img", "ins", "kbd", "mark", "q", "rp", "rt", "ruby", "s", "samp", "small",
        "span", "strike", "strong", "sub", "sup", "time", "tt", "u", "var", "wbr",
    ])
}

fn default_skip_elements() -> Vec<String> {
    to_strings(&[
        "script", "style", "noscript", "template", "svg", "math", "code", "pre", "kbd", "samp",
        "var", "textarea", "iframe", "object", "embed", "canvas", "video", "audio",
    ])
}

fn default_atomic_elements() -> Vec<String> {
    to_strings(&[
        "button", "select", "option", "optgroup", "label", "legend", "summary", "output",
        "dialog", "form",
    ])
}

fn default_atomic_classes() -> Vec<String> {
    to_strings(&["choice", "widget"])
}

fn default_no_translate_classes() -> Vec<String> {
    to_strings(&["notranslate"])
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_unit_chars: default_max_unit_chars(),
            min_split_chars: default_min_split_chars(),
            inline_elements: default_inline_elements(),
            skip_elements: default_skip_elements(),
            atomic_elements: default_atomic_elements(),
            atomic_classes: default_atomic_classes(),
            no_translate_classes: default_no_translate_classes(),
            preserve_foreign_language: true,
        }
    }
}

/// One run of inline content and the units cut from it
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    /// Child-index path from the document roots to the parent element
    pub parent: Vec<usize>,
    /// Range of the parent's children covered by the run
    pub children: Range<usize>,
    /// Structural path of the run
    pub path: String,
    /// Encoded run text (inline markup replaced by placeholders)
    pub text: String,
    /// Placeholders used in `text`
    pub table: PlaceholderTable,
    /// Units cut from this run, as indices into the unit list
    pub units: Range<usize>,
    /// The run is the text of a raw-text element and is copied back as text
    pub raw_text: bool,
}

/// The source document plus what the chunker did to it
#[derive(Debug, Clone)]
pub struct DocumentSkeleton {
    document: Arc<Document>,
    runs: Vec<RunPlan>,
}

impl DocumentSkeleton {
    /// The source document
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Runs in document order
    pub fn runs(&self) -> &[RunPlan] {
        &self.runs
    }
}

/// Result of chunking a document
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    /// Skeleton used for reassembly
    pub skeleton: DocumentSkeleton,
    /// Units in document order
    pub units: Vec<Unit>,
}

/// Splits documents into translation units
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker with the given configuration
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// The configuration in use
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a document
    pub fn chunk(&self, document: Arc<Document>) -> ChunkPlan {
        let language = document.metadata().language.clone();
        let mut walker = Walker {
            config: &self.config,
            language,
            runs: Vec::new(),
            units: Vec::new(),
        };
        let mut parent = Vec::new();
        walker.walk(document.nodes(), &mut parent, "", Scope::default());

        let Walker { runs, units, .. } = walker;
        debug!(
            "Chunked document into {} unit(s) across {} run(s)",
            units.len(),
            runs.len()
        );

        ChunkPlan {
            skeleton: DocumentSkeleton { document, runs },
            units,
        }
    }
}

/// Chunk a document with the given configuration
pub fn chunk(document: Arc<Document>, config: &ChunkerConfig) -> ChunkPlan {
    Chunker::new(config.clone()).chunk(document)
}

/// What the enclosing elements impose on the runs below them
#[derive(Debug, Clone, Copy, Default)]
struct Scope<'e> {
    /// Inside a widget container
    atomic: bool,
    /// Inside a raw-text element, by name
    raw_text: Option<&'e str>,
}

struct Walker<'a> {
    config: &'a ChunkerConfig,
    language: String,
    runs: Vec<RunPlan>,
    units: Vec<Unit>,
}

impl Walker<'_> {
    fn walk(&mut self, children: &[Node], parent: &mut Vec<usize>, path: &str, scope: Scope<'_>) {
        let mut run_start: Option<usize> = None;
        let mut run_index = 0;

        for (i, node) in children.iter().enumerate() {
            let continues_run = match node {
                Node::Text(_) => true,
                Node::Element(element) => self.is_inline(element),
                Node::Comment(_) | Node::Doctype(_) => false,
            };
            if continues_run {
                run_start.get_or_insert(i);
                continue;
            }

            if let Some(start) = run_start.take() {
                self.emit_run(children, start..i, parent, path, run_index, scope);
                run_index += 1;
            }

            if let Node::Element(element) = node {
                if self.is_skipped(element) {
                    continue;
                }
                let child_scope = Scope {
                    atomic: scope.atomic || self.is_atomic_container(element),
                    raw_text: RAW_TEXT_ELEMENTS
                        .contains(&element.name.as_str())
                        .then_some(element.name.as_str()),
                };
                let child_path = format!("{}/{}[{}]", path, element.name, i);
                parent.push(i);
                self.walk(&element.children, parent, &child_path, child_scope);
                parent.pop();
            }
        }

        if let Some(start) = run_start {
            self.emit_run(children, start..children.len(), parent, path, run_index, scope);
        }
    }

    fn is_skipped(&self, element: &Element) -> bool {
        if self.config.skip_elements.iter().any(|n| *n == element.name) {
            return true;
        }
        if element
            .attr("translate")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("no"))
        {
            return true;
        }
        if self.config.no_translate_classes.iter().any(|c| element.has_class(c)) {
            return true;
        }
        if self.config.preserve_foreign_language && element.name != "html" {
            if let Some(lang) = element.attr("lang") {
                if !lang.trim().is_empty() && !language_codes_match(lang, &self.language) {
                    return true;
                }
            }
        }
        false
    }

    fn is_atomic_container(&self, element: &Element) -> bool {
        self.config.atomic_elements.iter().any(|n| *n == element.name)
            || self.config.atomic_classes.iter().any(|c| element.has_class(c))
    }

    /// Inline elements continue a run if everything inside them is inline too
    fn is_inline(&self, element: &Element) -> bool {
        if !self.config.inline_elements.iter().any(|n| *n == element.name) {
            return false;
        }
        if self.is_skipped(element) {
            return true;
        }
        if self.is_atomic_container(element) {
            return false;
        }
        element.children.iter().all(|child| match child {
            Node::Text(_) => true,
            Node::Element(e) => self.is_inline(e),
            Node::Comment(_) | Node::Doctype(_) => false,
        })
    }

    fn encode(&self, nodes: &[Node], table: &mut PlaceholderTable, out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) if self.is_skipped(element) => {
                    let token = table.push(PlaceholderKind::Opaque, &element.name, &node.to_html());
                    out.push_str(&token);
                }
                Node::Element(element)
                    if element.close_tag.is_none() && element.children.is_empty() =>
                {
                    let kind = if VOID_ELEMENTS.contains(&element.name.as_str()) {
                        PlaceholderKind::Void
                    } else {
                        PlaceholderKind::Opaque
                    };
                    out.push_str(&table.push(kind, &element.name, &element.open_tag));
                }
                Node::Element(element) => {
                    out.push_str(&table.push(PlaceholderKind::Open, &element.name, &element.open_tag));
                    self.encode(&element.children, table, out);
                    let close = element.close_tag.as_deref().unwrap_or("");
                    out.push_str(&table.push(PlaceholderKind::Close, &element.name, close));
                }
                Node::Comment(_) | Node::Doctype(_) => {}
            }
        }
    }

    fn emit_run(
        &mut self,
        children: &[Node],
        range: Range<usize>,
        parent: &[usize],
        parent_path: &str,
        run_index: usize,
        scope: Scope<'_>,
    ) {
        let mut table = PlaceholderTable::new();
        let mut text = String::new();
        self.encode(&children[range.clone()], &mut table, &mut text);

        let visible = placeholders::strip_tokens(&text);
        let visible_chars = visible.trim().chars().count();
        if visible_chars == 0 {
            return;
        }

        let run_no = self.runs.len();
        let path = format!("{}#r{}", parent_path, run_index);
        let atomic = scope.atomic || scope.raw_text.is_some();
        let (kind, bounds) = if atomic || visible_chars < self.config.min_split_chars {
            (UnitKind::Atomic, vec![0..text.len()])
        } else {
            (
                UnitKind::SplittableFragment,
                split_ranges(&text, self.config.max_unit_chars),
            )
        };

        let first_unit = self.units.len();
        let fragment_count = bounds.len();
        for (fragment_index, bound) in bounds.into_iter().enumerate() {
            let fragment = &text[bound.clone()];
            let without_leading = fragment.trim_start();
            let leading_ws = &fragment[..fragment.len() - without_leading.len()];
            let trimmed = without_leading.trim_end();
            let trailing_ws = &without_leading[trimmed.len()..];

            let position = UnitPosition {
                path: format!("{}#f{}", path, fragment_index),
                run: run_no,
                fragment_index,
                fragment_count,
                start: bound.start,
                end: bound.end,
                leading_ws: leading_ws.to_string(),
                trailing_ws: trailing_ws.to_string(),
            };
            let index = self.units.len();
            let unit = Unit::new(index, kind, trimmed.to_string(), position, fragment);
            self.units.push(match scope.raw_text {
                Some(element) => unit.in_raw_text(element),
                None => unit,
            });
        }

        self.runs.push(RunPlan {
            parent: parent.to_vec(),
            children: range,
            path,
            text,
            table,
            units: first_unit..self.units.len(),
            raw_text: scope.raw_text.is_some(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Paragraph,
    Sentence,
    Whitespace,
}

const BOUNDARY_PREFERENCE: [BoundaryKind; 3] = [
    BoundaryKind::Paragraph,
    BoundaryKind::Sentence,
    BoundaryKind::Whitespace,
];

#[derive(Debug, Clone, Copy)]
struct Boundary {
    /// Byte offset where the next fragment starts
    byte: usize,
    /// Characters before the boundary
    chars: usize,
    /// Visible (non-space, non-placeholder) characters before the boundary
    text_before: usize,
    kind: BoundaryKind,
}

#[derive(Default)]
struct BoundaryScanner {
    boundaries: Vec<Boundary>,
    depth: i32,
    chars: usize,
    text: usize,
    pending_newlines: Option<usize>,
    sentence_end: bool,
    fullwidth_end: bool,
    br_streak: usize,
    br_break: bool,
}

impl BoundaryScanner {
    fn push(&mut self, at: usize, kind: BoundaryKind) {
        if self.depth == 0 && self.text > 0 {
            self.boundaries.push(Boundary {
                byte: at,
                chars: self.chars,
                text_before: self.text,
                kind,
            });
        }
    }

    fn close_whitespace(&mut self, at: usize) {
        if let Some(newlines) = self.pending_newlines.take() {
            let kind = if newlines >= 2 || self.br_break {
                BoundaryKind::Paragraph
            } else if self.sentence_end {
                BoundaryKind::Sentence
            } else {
                BoundaryKind::Whitespace
            };
            self.push(at, kind);
        }
    }

    fn scan(mut self, text: &str) -> (Vec<Boundary>, usize) {
        let tokens = placeholders::scan_tokens(text);
        let mut next_token = 0;
        let mut pos = 0;

        while pos < text.len() {
            if let Some(&(start, end, token)) = tokens.get(next_token) {
                if start == pos {
                    next_token += 1;
                    self.close_whitespace(start);
                    match placeholders::classify(token) {
                        Some((PlaceholderKind::Open, _)) => {
                            self.depth += 1;
                            self.br_streak = 0;
                        }
                        Some((PlaceholderKind::Close, _)) => {
                            self.depth -= 1;
                            self.br_streak = 0;
                        }
                        Some((PlaceholderKind::Void, "br")) if self.depth == 0 => {
                            self.br_streak += 1;
                            if self.br_streak >= 2 {
                                self.br_break = true;
                            }
                        }
                        _ => self.br_streak = 0,
                    }
                    self.chars += token.chars().count();
                    pos = end;
                    continue;
                }
            }

            let Some(ch) = text[pos..].chars().next() else {
                break;
            };
            if ch.is_whitespace() {
                *self.pending_newlines.get_or_insert(0) += usize::from(ch == '\n');
            } else {
                if self.pending_newlines.is_some() {
                    self.close_whitespace(pos);
                } else if self.br_break {
                    self.push(pos, BoundaryKind::Paragraph);
                } else if self.fullwidth_end {
                    self.push(pos, BoundaryKind::Sentence);
                }
                self.br_break = false;
                self.br_streak = 0;
                self.text += 1;
                self.sentence_end = if SENTENCE_TERMINALS.contains(&ch) {
                    true
                } else {
                    SENTENCE_CLOSERS.contains(&ch) && self.sentence_end
                };
                self.fullwidth_end = FULLWIDTH_TERMINALS.contains(&ch);
            }
            self.chars += 1;
            pos += ch.len_utf8();
        }

        (self.boundaries, self.text)
    }
}

/// Byte ranges of the fragments a run is cut into.
///
/// Ranges are contiguous and cover the whole text. Every fragment holds some
/// visible text, and no cut falls inside an inline element.
pub fn split_ranges(text: &str, max_chars: usize) -> Vec<Range<usize>> {
    let max = max_chars.max(1);
    let total_chars = text.chars().count();
    if total_chars <= max {
        return vec![0..text.len()];
    }

    let (boundaries, total_text) = BoundaryScanner::default().scan(text);
    let mut cuts = Vec::new();
    let (mut start_chars, mut start_text) = (0usize, 0usize);

    while total_chars - start_chars > max {
        let limit = start_chars + max;
        let valid: Vec<&Boundary> = boundaries
            .iter()
            .filter(|b| b.chars > start_chars && b.text_before > start_text && b.text_before < total_text)
            .collect();

        let within = |from: usize| {
            BOUNDARY_PREFERENCE.iter().find_map(|kind| {
                valid
                    .iter()
                    .filter(|b| b.kind == *kind && b.chars >= from && b.chars <= limit)
                    .last()
                    .copied()
            })
        };
        let chosen = within(start_chars + max / 2)
            .or_else(|| within(start_chars))
            .or_else(|| valid.iter().find(|b| b.chars > limit).copied());

        let Some(boundary) = chosen else {
            break;
        };
        cuts.push(boundary.byte);
        start_chars = boundary.chars;
        start_text = boundary.text_before;
    }

    let mut ranges = Vec::with_capacity(cuts.len() + 1);
    let mut from = 0;
    for cut in cuts {
        ranges.push(from..cut);
        from = cut;
    }
    ranges.push(from..text.len());
    ranges
}
