//! Integration tests for folder enumeration and download.

use drivedl_core::folder::{FailurePolicy, FolderOptions, FolderWalker};
use drivedl_core::{
    FolderError, MAX_NUMBER_FILES, ResourceDescriptor, ResourceKind, SessionOptions,
    parse_resource,
};
use futures_util::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{
    engine_for, entry, file_response, folder_meta, folder_page_response, keyless_engine_for, page,
};

fn parents_query(id: &str) -> String {
    format!("'{id}' in parents and trashed = false")
}

fn folder(id: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(ResourceKind::Folder, id)
}

async fn mount_meta(server: &MockServer, id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v3/files/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(folder_meta(id, name)))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, id: &str, token: Option<&str>, body: Value) {
    let mock = Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", parents_query(id).as_str()));
    let mock = match token {
        Some(token) => mock.and(query_param("pageToken", token)),
        None => mock.and(query_param_is_missing("pageToken")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_any_file(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .respond_with(file_response(b"data".to_vec(), "ignored"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Two pages of 30 and 21 plain files.
async fn mount_51_files(server: &MockServer) {
    mount_meta(server, "big", "Big Folder").await;
    let first: Vec<Value> = (0..30)
        .map(|i| entry(&format!("f{i}"), &format!("file{i:02}.txt"), false))
        .collect();
    let second: Vec<Value> = (30..51)
        .map(|i| entry(&format!("f{i}"), &format!("file{i:02}.txt"), false))
        .collect();
    mount_listing(server, "big", None, page(first, Some("p2"))).await;
    mount_listing(server, "big", Some("p2"), page(second, None)).await;
}

#[tokio::test]
async fn test_capacity_error_reports_counts_and_writes_nothing() {
    let server = MockServer::start().await;
    mount_51_files(&server).await;
    mount_any_file(&server, 0).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let err = walker
        .download_folder(&folder("big"), out.path(), &SessionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.capacity_counts(), Some((51, MAX_NUMBER_FILES)));
    assert!(err.to_string().contains("--remaining-ok"));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_remaining_ok_visits_every_entry() {
    let server = MockServer::start().await;
    mount_51_files(&server).await;
    mount_any_file(&server, 51).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(
        engine_for(&server),
        FolderOptions {
            remaining_ok: true,
            ..FolderOptions::default()
        },
    );
    let report = walker
        .download_folder(&folder("big"), out.path(), &SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(report.root, out.path().join("Big Folder"));
    assert_eq!(report.downloaded.len(), 51);
    assert!(report.failures.is_empty());
    assert!(report.root.join("file50.txt").exists());
}

#[tokio::test]
async fn test_walk_is_depth_first_in_listing_order() {
    let server = MockServer::start().await;
    mount_meta(&server, "root", "Root").await;
    mount_listing(
        &server,
        "root",
        None,
        page(
            vec![
                entry("a", "a.txt", false),
                entry("sub", "sub", true),
                entry("z", "z.txt", false),
            ],
            None,
        ),
    )
    .await;
    mount_listing(
        &server,
        "sub",
        None,
        page(vec![entry("b", "b.txt", false)], Some("next")),
    )
    .await;
    mount_listing(
        &server,
        "sub",
        Some("next"),
        page(vec![entry("c", "c.txt", false)], None),
    )
    .await;

    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let walk = walker
        .walk(&folder("root"), &SessionOptions::default())
        .await
        .unwrap();
    assert_eq!(walk.root().name, "Root");

    let entries: Vec<_> = walk
        .into_stream()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.relative_path.to_string_lossy().into_owned(),
                entry.descriptor.kind,
            )
        })
        .collect()
        .await;

    let sep = std::path::MAIN_SEPARATOR;
    assert_eq!(
        entries,
        vec![
            ("a.txt".to_string(), ResourceKind::File),
            ("sub".to_string(), ResourceKind::Folder),
            (format!("sub{sep}b.txt"), ResourceKind::File),
            (format!("sub{sep}c.txt"), ResourceKind::File),
            ("z.txt".to_string(), ResourceKind::File),
        ]
    );
}

#[tokio::test]
async fn test_nested_folder_download_mirrors_tree() {
    let server = MockServer::start().await;
    mount_meta(&server, "root", "Papers").await;
    mount_listing(
        &server,
        "root",
        None,
        page(
            vec![entry("sub", "2024", true), entry("a", "index.md", false)],
            None,
        ),
    )
    .await;
    mount_listing(
        &server,
        "sub",
        None,
        page(vec![entry("b", "paper.pdf", false)], None),
    )
    .await;
    mount_any_file(&server, 2).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let report = walker
        .download_folder(&folder("root"), out.path(), &SessionOptions::default())
        .await
        .unwrap();

    let root = out.path().join("Papers");
    assert_eq!(
        report.downloaded,
        vec![root.join("2024").join("paper.pdf"), root.join("index.md")]
    );
    assert_eq!(std::fs::read(root.join("index.md")).unwrap(), b"data");
}

#[tokio::test]
async fn test_child_names_are_sanitized() {
    let server = MockServer::start().await;
    mount_meta(&server, "root", "../escape").await;
    mount_listing(
        &server,
        "root",
        None,
        page(vec![entry("a", "../../evil.sh", false)], None),
    )
    .await;
    mount_any_file(&server, 1).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let report = walker
        .download_folder(&folder("root"), out.path(), &SessionOptions::default())
        .await
        .unwrap();

    assert!(report.root.starts_with(out.path()));
    for path in &report.downloaded {
        assert_eq!(path.parent(), Some(report.root.as_path()));
    }
}

async fn mount_one_failing_child(server: &MockServer) {
    mount_meta(server, "root", "Mixed").await;
    mount_listing(
        server,
        "root",
        None,
        page(
            vec![
                entry("bad", "bad.bin", false),
                entry("good", "good.bin", false),
            ],
            None,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", "bad"))
        .respond_with(ResponseTemplate::new(403))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", "good"))
        .respond_with(file_response(b"ok".to_vec(), "good.bin"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_failure() {
    let server = MockServer::start().await;
    mount_one_failing_child(&server).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let err = walker
        .download_folder(&folder("root"), out.path(), &SessionOptions::default())
        .await
        .unwrap_err();

    match err {
        FolderError::Download { path, source } => {
            assert!(path.ends_with("bad.bin"));
            assert!(source.is_resolution());
        }
        other => panic!("expected download error, got {other:?}"),
    }
    assert!(!out.path().join("Mixed").join("good.bin").exists());
}

#[tokio::test]
async fn test_skip_policy_records_failure_and_continues() {
    let server = MockServer::start().await;
    mount_one_failing_child(&server).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(
        engine_for(&server),
        FolderOptions {
            on_error: FailurePolicy::Skip,
            ..FolderOptions::default()
        },
    );
    let report = walker
        .download_folder(&folder("root"), out.path(), &SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(report.downloaded, vec![out.path().join("Mixed").join("good.bin")]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("bad.bin"));
}

#[tokio::test]
async fn test_file_metadata_is_not_a_folder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entry("doc", "doc.pdf", false)))
        .mount(&server)
        .await;

    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let err = walker
        .walk(
            &ResourceDescriptor::new(ResourceKind::Unknown, "doc"),
            &SessionOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FolderError::NotAFolder { .. }));
}

#[tokio::test]
async fn test_missing_folder_is_listing_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let err = walker
        .walk(&folder("nope"), &SessionOptions::default())
        .await
        .unwrap_err();
    match err {
        FolderError::Listing(source) => assert!(source.is_resolution()),
        other => panic!("expected listing error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_plain_folder_link_walks_without_fuzzy() {
    let server = MockServer::start().await;
    mount_meta(&server, "1FolderId", "Shared").await;
    mount_listing(
        &server,
        "1FolderId",
        None,
        page(vec![entry("a", "a.txt", false)], None),
    )
    .await;

    let descriptor =
        parse_resource("https://drive.google.com/drive/folders/1FolderId", false, false).unwrap();
    let walker = FolderWalker::new(engine_for(&server), FolderOptions::default());
    let mut walk = walker
        .walk(&descriptor, &SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(walk.root().name, "Shared");
    let first = walk.next_entry().await.unwrap().unwrap();
    assert_eq!(first.descriptor.id, "a");
    assert!(walk.next_entry().await.is_none());
}

async fn mount_folder_page(server: &MockServer, id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/folders/{id}")))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_keyless_download_reads_public_folder_pages() {
    let server = MockServer::start().await;
    mount_folder_page(
        &server,
        "1FolderId",
        folder_page_response(
            "Course Notes",
            &[("sub", "week 1", true), ("a", "syllabus.pdf", false)],
        ),
    )
    .await;
    mount_folder_page(
        &server,
        "sub",
        folder_page_response("week 1", &[("b", "it's \"lecture\".pdf", false)]),
    )
    .await;
    mount_any_file(&server, 2).await;

    let descriptor =
        parse_resource("https://drive.google.com/drive/folders/1FolderId", false, false).unwrap();
    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(keyless_engine_for(&server), FolderOptions::default());
    let report = walker
        .download_folder(&descriptor, out.path(), &SessionOptions::default())
        .await
        .unwrap();

    let root = out.path().join("Course Notes");
    assert_eq!(report.root, root);
    assert_eq!(
        report.downloaded,
        vec![
            root.join("week 1").join("it's _lecture_.pdf"),
            root.join("syllabus.pdf"),
        ]
    );
}

#[tokio::test]
async fn test_keyless_page_without_listing_is_not_a_folder() {
    let server = MockServer::start().await;
    mount_folder_page(
        &server,
        "doc",
        ResponseTemplate::new(200)
            .set_body_raw("<html><title>Sign in - Google Accounts</title></html>", "text/html"),
    )
    .await;

    let walker = FolderWalker::new(keyless_engine_for(&server), FolderOptions::default());
    let err = walker
        .walk(&folder("doc"), &SessionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FolderError::NotAFolder { .. }), "{err}");
}

#[tokio::test]
async fn test_keyless_listing_is_capped() {
    let server = MockServer::start().await;
    let names: Vec<(String, String)> = (0..51)
        .map(|i| (format!("f{i}"), format!("file{i:02}.txt")))
        .collect();
    let entries: Vec<(&str, &str, bool)> = names
        .iter()
        .map(|(id, name)| (id.as_str(), name.as_str(), false))
        .collect();
    mount_folder_page(&server, "big", folder_page_response("Big", &entries)).await;
    mount_any_file(&server, 0).await;

    let out = TempDir::new().unwrap();
    let walker = FolderWalker::new(keyless_engine_for(&server), FolderOptions::default());
    let err = walker
        .download_folder(&folder("big"), out.path(), &SessionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.capacity_counts(), Some((51, MAX_NUMBER_FILES)));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}
