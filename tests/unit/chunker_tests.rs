/*!
 * Tests for chunking a whole document into translation units
 */

use std::sync::Arc;

use yahtwai::document::parse_document;
use yahtwai::translation::placeholders::is_well_nested;
use yahtwai::translation::{chunk, ChunkPlan, ChunkerConfig, UnitKind};

use crate::common::{long_document, SAMPLE_HTML};

fn plan(html: &str, config: &ChunkerConfig) -> ChunkPlan {
    chunk(Arc::new(parse_document(html).unwrap()), config)
}

#[test]
fn test_chunk_withSampleChapter_shouldPickTranslatableText() {
    let plan = plan(SAMPLE_HTML, &ChunkerConfig::default());
    let sources: Vec<&str> = plan.units.iter().map(|u| u.source_text.as_str()).collect();

    assert_eq!(
        sources,
        vec![
            "Chapter One",
            "The Lighthouse",
            "Hello, <b>world</b>.",
            "The keeper climbed <em>two hundred</em> steps every evening.<br>He never counted them aloud.",
            "Continue reading",
            "See <a>the notes</a> for details.",
        ]
    );
    assert!(plan.units.iter().all(|u| u.kind == UnitKind::Atomic));
    assert!(!sources.iter().any(|s| s.contains("Lux") || s.contains("pages")));
}

#[test]
fn test_chunk_shouldNumberUnitsInDocumentOrder() {
    let plan = plan(SAMPLE_HTML, &ChunkerConfig::default());
    for (i, unit) in plan.units.iter().enumerate() {
        assert_eq!(unit.index, i);
        assert_eq!(unit.id.len(), 17);
        assert!(unit.id.starts_with('u'));
    }
}

#[test]
fn test_chunk_withEditedParagraph_shouldOnlyChangeThatId() {
    let original = plan(SAMPLE_HTML, &ChunkerConfig::default());
    let edited_html = SAMPLE_HTML.replace("He never counted", "He always counted");
    let edited = plan(&edited_html, &ChunkerConfig::default());

    let changed: Vec<usize> = original
        .units
        .iter()
        .zip(edited.units.iter())
        .filter(|(a, b)| a.id != b.id)
        .map(|(a, _)| a.index)
        .collect();
    assert_eq!(changed, vec![3]);
}

#[test]
fn test_chunk_withLongParagraph_shouldSplitWithoutBreakingMarkup() {
    let html = long_document(40);
    let config = ChunkerConfig {
        max_unit_chars: 300,
        ..ChunkerConfig::default()
    };
    let plan = plan(&html, &config);

    let fragments: Vec<_> = plan
        .units
        .iter()
        .filter(|u| u.kind == UnitKind::SplittableFragment)
        .collect();
    assert!(fragments.len() > 5, "only {} fragments", fragments.len());
    for unit in fragments {
        assert!(is_well_nested(&unit.source_text), "cut through markup: {}", unit.source_text);
        assert!(unit.source_text.ends_with('.'), "bad cut: {}", unit.source_text);
        assert_eq!(unit.position.fragment_count, plan.units.len() - 1);
    }
}

#[test]
fn test_chunk_withSameInput_shouldProduceSameIds() {
    let html = long_document(25);
    let config = ChunkerConfig {
        max_unit_chars: 250,
        ..ChunkerConfig::default()
    };
    let first: Vec<String> = plan(&html, &config).units.into_iter().map(|u| u.id).collect();
    let second: Vec<String> = plan(&html, &config).units.into_iter().map(|u| u.id).collect();
    assert_eq!(first, second);
}
