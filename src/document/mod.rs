/*!
 * HTML document handling.
 *
 * - `model`: the node tree (`Document`, `Node`, `Element`) and its metadata
 * - `parser`: lossless tokenizer and tree builder
 */

pub mod model;
pub mod parser;

pub use model::{Attribute, Direction, Document, DocumentMetadata, Element, Node, NodeKind};
pub use parser::{parse_document, parse_fragment};
