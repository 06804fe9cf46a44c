/*!
 * Reassembler.
 *
 * Builds the output document from the skeleton kept by the chunker and the
 * terminal units. Each run is rebuilt from its fragments, placeholders are
 * decoded back to the exact source tags, and the result replaces the run's
 * nodes. Runs inside raw-text elements are copied back as a single text
 * node. Everything outside runs is copied unchanged.
 */

use std::collections::HashMap;
use std::ops::Range;

use log::debug;

use super::chunker::{DocumentSkeleton, RunPlan};
use super::unit::{Unit, UnitStatus};
use crate::document::{parse_fragment, Direction, Document, Node};
use crate::errors::ReassembleError;

/// Opening marker around source text kept for a failed unit
pub const UNTRANSLATED_OPEN: &str = "<!--yahtwai:untranslated ";

/// Closing marker around source text kept for a failed unit
pub const UNTRANSLATED_CLOSE: &str = "<!--/yahtwai:untranslated-->";

/// Rebuild the document; the language attributes are left as they are
pub fn reassemble(skeleton: &DocumentSkeleton, units: &[Unit]) -> Result<Document, ReassembleError> {
    Reassembler::new().reassemble(skeleton, units)
}

/// Options for rebuilding a document
#[derive(Debug, Clone, Default)]
pub struct Reassembler {
    target_language: Option<String>,
}

type Replacements = HashMap<Vec<usize>, Vec<(Range<usize>, Vec<Node>)>>;

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `<html lang>` to `language` and `dir` to its direction
    pub fn rewrite_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }

    /// Rebuild the document.
    ///
    /// Fails with `IncompleteJob` when any unit is neither validated nor
    /// permanently failed.
    pub fn reassemble(
        &self,
        skeleton: &DocumentSkeleton,
        units: &[Unit],
    ) -> Result<Document, ReassembleError> {
        let open: Vec<&Unit> = units.iter().filter(|u| !u.status.is_terminal()).collect();
        if let Some(first) = open.first() {
            return Err(ReassembleError::IncompleteJob {
                remaining: open.len(),
                first_unit: first.id.clone(),
            });
        }

        let mut replacements: Replacements = HashMap::new();
        let mut changed_runs = 0;
        for run in skeleton.runs() {
            let encoded = rebuild_run_text(run, &units[run.units.clone()]);
            if encoded == run.text {
                continue;
            }
            let nodes = if run.raw_text {
                vec![Node::Text(encoded)]
            } else {
                let decoded = run.table.decode(&encoded);
                parse_fragment(&decoded).map_err(|source| ReassembleError::Fragment {
                    path: run.path.clone(),
                    source,
                })?
            };
            replacements
                .entry(run.parent.clone())
                .or_default()
                .push((run.children.clone(), nodes));
            changed_runs += 1;
        }
        debug!(
            "Reassembling document: {} of {} run(s) changed",
            changed_runs,
            skeleton.runs().len()
        );

        for list in replacements.values_mut() {
            list.sort_by_key(|(range, _)| range.start);
        }

        let mut path = Vec::new();
        let nodes = self.rebuild(skeleton.document().nodes(), &mut path, &replacements);
        Document::from_nodes(nodes).map_err(|source| ReassembleError::Fragment {
            path: "/html".to_string(),
            source,
        })
    }

    fn rebuild(&self, nodes: &[Node], path: &mut Vec<usize>, replacements: &Replacements) -> Vec<Node> {
        let here = replacements.get(path.as_slice());
        let mut pending = here.map(|list| list.iter().peekable());
        let mut out = Vec::with_capacity(nodes.len());
        let mut i = 0;

        while i < nodes.len() {
            if let Some((range, new_nodes)) = pending
                .as_mut()
                .and_then(|it| it.next_if(|(range, _)| range.start == i))
            {
                out.extend(new_nodes.iter().cloned());
                i = range.end.max(i + 1);
                continue;
            }

            match &nodes[i] {
                Node::Element(element) => {
                    path.push(i);
                    let children = self.rebuild(&element.children, path, replacements);
                    path.pop();

                    let mut rebuilt = match (&self.target_language, element.name.as_str(), path.is_empty()) {
                        (Some(language), "html", true) => element
                            .with_attribute("lang", language)
                            .with_attribute("dir", &Direction::for_language(language).to_string()),
                        _ => element.clone(),
                    };
                    rebuilt.children = children;
                    out.push(Node::Element(rebuilt));
                }
                other => out.push(other.clone()),
            }
            i += 1;
        }
        out
    }
}

/// Encoded run text with every fragment replaced by its output
fn rebuild_run_text(run: &RunPlan, units: &[Unit]) -> String {
    let mut out = String::with_capacity(run.text.len());
    let mut cursor = 0;

    for unit in units {
        let position = &unit.position;
        if position.start > cursor {
            out.push_str(&run.text[cursor..position.start]);
        }
        out.push_str(&position.leading_ws);
        match unit.status {
            UnitStatus::Validated => out.push_str(unit.output_text()),
            // A comment inside raw text would be shown as text
            _ if run.raw_text => out.push_str(&unit.source_text),
            _ => {
                out.push_str(UNTRANSLATED_OPEN);
                out.push_str(&unit.id);
                out.push_str("-->");
                out.push_str(&unit.source_text);
                out.push_str(UNTRANSLATED_CLOSE);
            }
        }
        out.push_str(&position.trailing_ws);
        cursor = position.end;
    }

    if cursor < run.text.len() {
        out.push_str(&run.text[cursor..]);
    }
    out
}
