use super::*;

fn metadata() -> DocumentMetadata {
    DocumentMetadata {
        source: "lecture.pdf".to_string(),
        file_path: "week1/lecture.pdf".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_locator_prefers_page() {
    let meta = DocumentMetadata {
        page: Some("3".to_string()),
        slide: Some(7),
        section: Some("Intro".to_string()),
        ..metadata()
    };
    assert_eq!(meta.locator(), Some("3".to_string()));
}

#[test]
fn test_locator_falls_back_to_slide_then_section() {
    let slide = DocumentMetadata {
        slide: Some(7),
        section: Some("Intro".to_string()),
        ..metadata()
    };
    assert_eq!(slide.locator(), Some("7".to_string()));

    let section = DocumentMetadata {
        section: Some("Intro".to_string()),
        ..metadata()
    };
    assert_eq!(section.locator(), Some("Intro".to_string()));

    assert_eq!(metadata().locator(), None);
}

#[test]
fn test_chunk_metadata_flattens_document_fields() {
    let meta = ChunkMetadata {
        document: DocumentMetadata {
            page: Some("2".to_string()),
            ..metadata()
        },
        timestamp: 1_700_000_000,
    };
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["source"], "lecture.pdf");
    assert_eq!(json["page"], "2");
    assert_eq!(json["timestamp"], 1_700_000_000);
    assert!(json.get("slide").is_none());

    let back: ChunkMetadata = serde_json::from_value(json).unwrap();
    assert_eq!(back, meta);
}

#[test]
fn test_ingest_request_rebuild_defaults_to_true() {
    let req: IngestRequest = serde_json::from_str(r#"{"namespace":"kb"}"#).unwrap();
    assert!(req.rebuild);
    assert!(IngestRequest::new("kb").rebuild);
}

#[test]
fn test_ask_request_top_k_optional() {
    let req: AskRequest =
        serde_json::from_str(r#"{"namespace":"kb","question":"What is TCP?"}"#).unwrap();
    assert_eq!(req.top_k, None);
}

#[test]
fn test_context_item_serialization() {
    let item = ContextItem {
        source: "notes.md".to_string(),
        page: None,
        text: "TCP is reliable.".to_string(),
    };
    let json = serde_json::to_string(&item).unwrap();
    assert!(json.contains("\"page\":null"));
}
