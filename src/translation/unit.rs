/*!
 * Translation units.
 *
 * A unit is the smallest piece of content sent for translation in one call.
 * Its id is derived from where it sits in the document and what it says, so
 * re-chunking identical input yields identical ids and edited content yields
 * new ones.
 */

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex digits kept from the id hash
const UNIT_ID_HEX_LEN: usize = 16;

/// Whether a unit may be subdivided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Widget content or short text, always translated whole
    Atomic,
    /// One fragment of a longer run
    SplittableFragment,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Atomic => write!(f, "atomic"),
            UnitKind::SplittableFragment => write!(f, "splittable_fragment"),
        }
    }
}

/// Translation status of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Waiting for an attempt
    Pending,
    /// An attempt is running
    InFlight,
    /// Translated and accepted
    Validated,
    /// Gave up; the source text is kept
    FailedPermanent,
}

impl UnitStatus {
    /// Whether no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Validated | UnitStatus::FailedPermanent)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Pending => write!(f, "pending"),
            UnitStatus::InFlight => write!(f, "in_flight"),
            UnitStatus::Validated => write!(f, "validated"),
            UnitStatus::FailedPermanent => write!(f, "failed_permanent"),
        }
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(UnitStatus::Pending),
            "in_flight" => Ok(UnitStatus::InFlight),
            "validated" => Ok(UnitStatus::Validated),
            "failed_permanent" => Ok(UnitStatus::FailedPermanent),
            _ => Err(anyhow::anyhow!("Invalid unit status: {}", s)),
        }
    }
}

/// Where a unit came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPosition {
    /// Structural path of the fragment, e.g. `/html[2]/body[3]/p[1]#r0#f0`
    pub path: String,
    /// Index of the run in the skeleton
    pub run: usize,
    /// Index of this fragment within its run
    pub fragment_index: usize,
    /// Number of fragments the run was split into
    pub fragment_count: usize,
    /// Byte offset of the fragment in the encoded run text
    pub start: usize,
    /// Byte offset one past the fragment
    pub end: usize,
    /// Whitespace trimmed from the front of the fragment
    pub leading_ws: String,
    /// Whitespace trimmed from the back of the fragment
    pub trailing_ws: String,
}

/// A translation work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Stable id
    pub id: String,
    /// Position in the chunk sequence
    pub index: usize,
    /// Atomic or fragment
    pub kind: UnitKind,
    /// Trimmed source text with placeholder tags
    pub source_text: String,
    /// Bounded text preceding the unit
    pub context_before: String,
    /// Bounded text following the unit
    pub context_after: String,
    /// Current status
    pub status: UnitStatus,
    /// Attempts made so far
    pub attempt_count: u32,
    /// Accepted translation
    pub translated_text: Option<String>,
    /// Reason of the last failure
    pub failure_reason: Option<String>,
    /// Origin in the document
    pub position: UnitPosition,
    /// Enclosing raw-text element (`title`), whose text holds no markup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text_element: Option<String>,
}

impl Unit {
    /// Create a pending unit
    pub fn new(
        index: usize,
        kind: UnitKind,
        source_text: String,
        position: UnitPosition,
        full_fragment: &str,
    ) -> Self {
        Self {
            id: unit_id(&position.path, full_fragment),
            index,
            kind,
            source_text,
            context_before: String::new(),
            context_after: String::new(),
            status: UnitStatus::Pending,
            attempt_count: 0,
            translated_text: None,
            failure_reason: None,
            position,
            raw_text_element: None,
        }
    }

    /// Mark the unit as the text of a raw-text element
    pub fn in_raw_text(mut self, element: &str) -> Self {
        self.raw_text_element = Some(element.to_string());
        self
    }

    /// Text for the output document: the translation when validated, the source otherwise
    pub fn output_text(&self) -> &str {
        match (&self.status, &self.translated_text) {
            (UnitStatus::Validated, Some(text)) => text,
            _ => &self.source_text,
        }
    }

    /// Whether the source contains any tag placeholder
    pub fn has_placeholders(&self) -> bool {
        self.raw_text_element.is_none() && super::placeholders::TAG_LIKE_RE.is_match(&self.source_text)
    }
}

/// Stable unit id from structural path and fragment text
pub fn unit_id(path: &str, fragment: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0x1f]);
    hasher.update(fragment.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("u{}", &hex[..UNIT_ID_HEX_LEN])
}
