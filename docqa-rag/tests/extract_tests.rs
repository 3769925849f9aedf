//! Source extraction from the local file system.

use std::path::Path;

use docqa_rag::{Extractor, RagError, Source, SourceExtractor};

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn source_kind_follows_extension() {
    assert!(matches!(Source::from_path("a.PDF").unwrap(), Source::Pdf(_)));
    assert!(matches!(Source::from_path("notes.md").unwrap(), Source::Text(_)));
    assert!(matches!(Source::from_path("notes.txt").unwrap(), Source::Text(_)));
    match Source::from_path("data/blogging.json").unwrap() {
        Source::JsonRecords { key, .. } => assert_eq!(key, "users"),
        other => panic!("unexpected source: {other:?}"),
    }

    let err = Source::from_path("slides.pptx").unwrap_err();
    assert!(matches!(err, RagError::Extraction { ref source_id, .. } if source_id == "slides.pptx"));
}

#[tokio::test]
async fn json_records_become_one_document_each() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "blogging.json",
        r#"{
            "blogs": [{"title": "ignored"}],
            "users": [
                {"_id": "64f1", "name": "Ada", "email": "ada@example.com"},
                {"name": "Grace"}
            ]
        }"#,
    );

    let documents = SourceExtractor.extract(&Source::json_records(&path, "users")).await.unwrap();

    assert_eq!(documents.len(), 2);
    let source_id = path.display().to_string();
    assert_eq!(documents[0].id, format!("{source_id}#users[0]"));
    assert!(documents[0].text.contains("\"email\": \"ada@example.com\""));
    assert_eq!(documents[0].metadata["kind"], "json_record");
    assert_eq!(documents[0].metadata["record_id"], "64f1");
    assert_eq!(documents[1].metadata["record_index"], "1");
    assert!(!documents[1].metadata.contains_key("record_id"));
    assert!(documents.iter().all(|d| !d.text.contains("ignored")));
}

#[tokio::test]
async fn json_records_require_an_array_under_the_key() {
    let dir = tempfile::tempdir().unwrap();
    let missing = write(dir.path(), "missing.json", r#"{"blogs": []}"#);
    let scalar = write(dir.path(), "scalar.json", r#"{"users": 3}"#);
    let broken = write(dir.path(), "broken.json", "{not json");

    for (path, needle) in [
        (missing, "missing key 'users'"),
        (scalar, "not an array"),
        (broken, "invalid JSON"),
    ] {
        let err = SourceExtractor.extract(&Source::json_records(&path, "users")).await.unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
        assert!(err.to_string().contains(needle), "{err}");
    }
}

#[tokio::test]
async fn text_files_yield_a_single_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "guide.md", "# Guide\n\nInstall the tool first.");

    let documents = SourceExtractor.extract(&Source::from_path(&path).unwrap()).await.unwrap();

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].text, "# Guide\n\nInstall the tool first.");
    assert_eq!(documents[0].metadata["file_name"], "guide.md");
    assert_eq!(documents[0].source_uri.as_deref(), Some(path.display().to_string().as_str()));
}

#[tokio::test]
async fn blank_and_missing_files_are_extraction_errors() {
    let dir = tempfile::tempdir().unwrap();
    let blank = write(dir.path(), "blank.txt", "  \n\t ");

    let err = SourceExtractor.extract(&Source::Text(blank)).await.unwrap_err();
    assert!(err.to_string().contains("no extractable text"), "{err}");

    let absent = dir.path().join("absent.pdf");
    let err = SourceExtractor.extract(&Source::Pdf(absent.clone())).await.unwrap_err();
    assert!(
        matches!(err, RagError::Extraction { ref source_id, .. } if *source_id == absent.display().to_string())
    );
}
