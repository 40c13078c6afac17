//! Integration tests for the zip archive engine.

mod helpers;

use tempfile::TempDir;

use treehub_core::config::archive::ArchiveConfig;
use treehub_core::config::storage::StorageConfig;
use treehub_core::error::ErrorKind;
use treehub_core::traits::blob::BlobStore;
use treehub_engine::ArchiveService;
use treehub_lock::keys;

use helpers::TestEngine;

fn archive_service(engine: &TestEngine, temp: &TempDir) -> ArchiveService {
    archive_service_with(engine, temp, ArchiveConfig::default())
}

fn archive_service_with(
    engine: &TestEngine,
    temp: &TempDir,
    config: ArchiveConfig,
) -> ArchiveService {
    let storage = StorageConfig {
        temp_dir: temp.path().to_string_lossy().into_owned(),
        ..StorageConfig::default()
    };
    ArchiveService::new(engine.tree.clone(), config, &storage)
}

#[tokio::test]
async fn test_round_trip_multiple_items_gets_intermediate_folder() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let folder = engine.folder(root.id, "project").await;
    engine.file(folder.id, "readme.md", "hello").await;
    let loose = engine.file(root.id, "loose.txt", "world").await;

    let archive = archives
        .compress(engine.actor, root.id, &[folder.id, loose.id], "backup")
        .await
        .unwrap();
    assert_eq!(archive.name, "backup.zip");
    assert_eq!(archive.mime, "application/zip");

    // Extract into a fresh root. Two top-level entries mean an
    // intermediate folder named after the archive.
    let target = engine.root("restored").await;
    let landed = archives
        .extract(engine.actor, archive.id, Some(target.id))
        .await
        .unwrap();
    assert_eq!(landed.name, "backup");
    assert_eq!(landed.parent_id, Some(target.id));

    let entries = engine.store.children(landed.id).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["loose.txt", "project"]);

    let project = entries.iter().find(|n| n.name == "project").unwrap();
    let inner = engine.store.children(project.id).await.unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].name, "readme.md");
    assert_eq!(engine.content(&inner[0]).await, "hello");

    let loose_copy = entries.iter().find(|n| n.name == "loose.txt").unwrap();
    assert_eq!(engine.content(loose_copy).await, "world");
}

#[tokio::test]
async fn test_extract_single_top_level_entry_goes_direct() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let folder = engine.folder(root.id, "only").await;
    engine.file(folder.id, "a.txt", "a").await;

    let archive = archives
        .compress(engine.actor, root.id, &[folder.id], "single.zip")
        .await
        .unwrap();

    let target = engine.root("out").await;
    let landed = archives
        .extract(engine.actor, archive.id, Some(target.id))
        .await
        .unwrap();
    // No intermediate folder: the destination itself is returned.
    assert_eq!(landed.id, target.id);
    let entries = engine.store.children(target.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "only");
}

#[tokio::test]
async fn test_compress_rejects_empty_and_non_child_selection() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let other = engine.root("other").await;
    let stray = engine.file(other.id, "stray.txt", "x").await;

    let empty = archives
        .compress(engine.actor, root.id, &[], "a")
        .await
        .unwrap_err();
    assert_eq!(empty.kind, ErrorKind::Validation);

    let stranger = archives
        .compress(engine.actor, root.id, &[stray.id], "a")
        .await
        .unwrap_err();
    assert_eq!(stranger.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_compress_respects_site_policy() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service_with(
        &engine,
        &temp,
        ArchiveConfig {
            allow_zip_extension: false,
            ..ArchiveConfig::default()
        },
    );

    let root = engine.root("r").await;
    let file = engine.file(root.id, "a.txt", "x").await;
    let err = archives
        .compress(engine.actor, root.id, &[file.id], "a")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_compress_fails_when_selection_is_busy() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let file = engine.file(root.id, "a.txt", "x").await;
    engine.locks.lock(&keys::edit(file.id)).await.unwrap();

    let err = archives
        .compress(engine.actor, root.id, &[file.id], "a")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Busy);
    // No half-written archive node appeared.
    assert_eq!(engine.store.children(root.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_media_only_selection_yields_archive_error() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    // A media node has no retrievable local content.
    let mut media = treehub_entity::node::Node::new_file(
        "clip",
        "video/mp4",
        engine.actor,
        &root,
        treehub_core::types::BlobId::new(),
        0,
    );
    media.payload = treehub_entity::node::NodePayload::Media {
        media_ref: "ext://clip".to_string(),
    };
    engine.store.save(&media).await.unwrap();

    let err = archives
        .compress(engine.actor, root.id, &[media.id], "a")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Archive);
}

#[tokio::test]
async fn test_extract_enforces_entry_limit() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let strict = archive_service_with(
        &engine,
        &temp,
        ArchiveConfig {
            max_entries: 1,
            ..ArchiveConfig::default()
        },
    );
    let relaxed = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let a = engine.file(root.id, "a.txt", "a").await;
    let b = engine.file(root.id, "b.txt", "b").await;
    let archive = relaxed
        .compress(engine.actor, root.id, &[a.id, b.id], "two")
        .await
        .unwrap();

    let target = engine.root("out").await;
    let err = strict
        .extract(engine.actor, archive.id, Some(target.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Archive);
    // Nothing was created in the destination.
    assert!(engine.store.children(target.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_extract_rejects_non_archive_node() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let folder = engine.folder(root.id, "sub").await;
    let err = archives
        .extract(engine.actor, folder.id, Some(root.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_compress_releases_all_locks() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let folder = engine.folder(root.id, "sub").await;
    engine.file(folder.id, "a.txt", "x").await;
    archives
        .compress(engine.actor, root.id, &[folder.id], "out")
        .await
        .unwrap();

    assert!(!engine.locks.is_held(&keys::edit(folder.id)).await.unwrap());
    assert!(!engine.locks.is_held(&keys::edit(root.id)).await.unwrap());
}

#[tokio::test]
async fn test_compress_entry_names_follow_rename() {
    let engine = TestEngine::new();
    let temp = TempDir::new().unwrap();
    let archives = archive_service(&engine, &temp);

    let root = engine.root("r").await;
    let file = engine.file(root.id, "draft.txt", "text").await;
    engine
        .tree
        .rename(engine.actor, file.id, "final.txt")
        .await
        .unwrap();

    // The selection was captured by id before the rename; the archive
    // must still carry the node's current name.
    let archive = archives
        .compress(engine.actor, root.id, &[file.id], "out")
        .await
        .unwrap();

    let blob = archive.blob().expect("archive has a blob");
    let bytes = engine.blobs.read_bytes(blob).await.unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["final.txt"]);
}
