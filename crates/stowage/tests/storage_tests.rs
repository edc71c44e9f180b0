//! Integration tests for stowage on the local filesystem

use std::io::SeekFrom;

use futures_util::TryStreamExt;
use stowage::*;
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;

fn filesystem_storage(root: &std::path::Path) -> Storage {
    Storage::new(FileSystemBackend::new(root, "/uploads").unwrap())
}

#[tokio::test]
async fn test_round_trip_is_byte_identical() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());

    let content: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let name = storage.save("blob.bin", content.clone(), None).await.unwrap();
    assert_eq!(name, "blob.bin");

    let mut file = storage.open(&name).await.unwrap();
    assert_eq!(file.size().await.unwrap(), content.len() as u64);
    let data = file.read_to_end().await.unwrap();
    assert_eq!(data.as_ref(), content.as_slice());
    assert!(file.read(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_text_content_is_stored_as_utf8() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());

    let name = storage.save("notes.txt", "héllo wörld", None).await.unwrap();
    let on_disk = std::fs::read(temp_dir.path().join(&name)).unwrap();
    assert_eq!(on_disk, "héllo wörld".as_bytes());
}

#[tokio::test]
async fn test_stream_content() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());

    let source = temp_dir.path().join("source.dat");
    let mut writer = tokio::fs::File::create(&source).await.unwrap();
    writer.write_all(b"streamed bytes").await.unwrap();
    writer.flush().await.unwrap();
    drop(writer);

    let reader = tokio::fs::File::open(&source).await.unwrap();
    let name = storage
        .save("copy.dat", Content::stream(reader), Some("streams"))
        .await
        .unwrap();
    assert_eq!(name, "streams/copy.dat");

    let mut file = storage.open(&name).await.unwrap();
    assert_eq!(file.read_to_end().await.unwrap().as_ref(), b"streamed bytes");
}

#[tokio::test]
async fn test_name_collision_in_folder() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());

    assert_eq!(
        storage.save("report.pdf", "v0", Some("invoices")).await.unwrap(),
        "invoices/report.pdf"
    );
    assert_eq!(
        storage.save("report.pdf", "v1", Some("invoices")).await.unwrap(),
        "invoices/report_1.pdf"
    );
    assert_eq!(
        storage.save("report.pdf", "v2", Some("invoices")).await.unwrap(),
        "invoices/report_2.pdf"
    );

    let mut file = storage.open("invoices/report.pdf").await.unwrap();
    assert_eq!(file.read_to_end().await.unwrap().as_ref(), b"v0");
    let mut file = storage.open("invoices/report_2.pdf").await.unwrap();
    assert_eq!(file.read_to_end().await.unwrap().as_ref(), b"v2");
}

#[tokio::test]
async fn test_collision_with_files_created_outside_storage() {
    let temp_dir = tempdir().unwrap();
    std::fs::create_dir(temp_dir.path().join("reports")).unwrap();
    std::fs::write(temp_dir.path().join("reports/report.pdf"), b"a").unwrap();
    std::fs::write(temp_dir.path().join("reports/report_1.pdf"), b"b").unwrap();

    let storage = filesystem_storage(temp_dir.path());
    let name = storage.save("report.pdf", "c", Some("reports")).await.unwrap();
    assert_eq!(name, "reports/report_2.pdf");
}

#[tokio::test]
async fn test_saving_twice_into_same_folder_succeeds() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());

    storage.save("a.txt", "1", Some("shared")).await.unwrap();
    storage.save("b.txt", "2", Some("shared")).await.unwrap();

    assert!(storage.exists("shared/a.txt").await.unwrap());
    assert!(storage.exists("shared/b.txt").await.unwrap());
}

#[tokio::test]
async fn test_create_folder_twice_reports_already_exists() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());

    storage.create_folder("media/photos").await.unwrap();
    let err = storage.create_folder("media/photos").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_seek_and_tell() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());
    let name = storage.save("digits.txt", "0123456789", None).await.unwrap();

    let mut file = storage.open(&name).await.unwrap();
    let size = file.size().await.unwrap();
    assert_eq!(size, 10);

    file.seek(SeekFrom::Start(size)).await.unwrap();
    assert!(file.read(None).await.unwrap().is_empty());

    file.seek(SeekFrom::End(-4)).await.unwrap();
    assert_eq!(file.tell(), size - 4);
    assert_eq!(file.read(Some(2)).await.unwrap().as_ref(), b"67");
    assert_eq!(file.tell(), 8);

    file.seek(SeekFrom::Current(-8)).await.unwrap();
    assert_eq!(file.read(Some(3)).await.unwrap().as_ref(), b"012");

    let err = file.seek(SeekFrom::Current(-10)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_traversal_is_rejected_everywhere() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("data");
    std::fs::create_dir(&root).unwrap();
    std::fs::create_dir(temp_dir.path().join("data-evil")).unwrap();
    std::fs::write(temp_dir.path().join("data-evil/secret.txt"), b"secret").unwrap();
    let storage = filesystem_storage(&root);

    let err = storage.open("../data-evil/secret.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainmentViolation);

    let err = storage.delete("../data-evil/secret.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
    assert!(temp_dir.path().join("data-evil/secret.txt").exists());

    let err = storage.delete_folder("..").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainmentViolation);

    let err = storage.path("../../etc/passwd").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainmentViolation);

    let err = storage
        .save("x.txt", "x", Some("../data-evil"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
}

#[tokio::test]
async fn test_dot_dot_inside_root_is_fine() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());
    storage.save("a.txt", "inside", Some("docs")).await.unwrap();

    let mut file = storage.open("docs/ignored/../a.txt").await.unwrap();
    assert_eq!(file.name(), "docs/a.txt");
    assert_eq!(file.read_to_end().await.unwrap().as_ref(), b"inside");
}

#[tokio::test]
async fn test_delete_and_delete_folder() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());
    storage.save("a.txt", "1", Some("tmp")).await.unwrap();
    storage.save("b.txt", "2", Some("tmp/nested")).await.unwrap();

    storage.delete("tmp/a.txt").await.unwrap();
    assert!(!storage.exists("tmp/a.txt").await.unwrap());
    assert!(storage.delete("tmp/a.txt").await.unwrap_err().is_not_found());

    storage.delete_folder("tmp").await.unwrap();
    assert!(!storage.exists("tmp").await.unwrap());
    assert!(storage.delete_folder("tmp").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_listing() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(temp_dir.path());
    storage.save("a.txt", "1", None).await.unwrap();
    storage.save("b.txt", "2", None).await.unwrap();
    storage.save("c.txt", "3", Some("docs")).await.unwrap();
    storage.create_folder("photos").await.unwrap();

    let mut files: Vec<String> = storage.list_files().await.unwrap().try_collect().await.unwrap();
    files.sort();
    assert_eq!(files, vec!["a.txt", "b.txt"]);

    let mut folders: Vec<String> = storage
        .list_folders()
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    folders.sort();
    assert_eq!(folders, vec!["docs", "photos"]);

    let nested: Vec<String> = storage
        .list_files_in("docs")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(nested, vec!["c.txt"]);

    let err = storage.list_files_in("missing").await.err().unwrap();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_url_path_and_metadata() {
    let temp_dir = tempdir().unwrap();
    let storage = Storage::new(
        FileSystemBackend::new(temp_dir.path(), "https://cdn.example.com/uploads/").unwrap(),
    );
    let name = storage.save("Q1 report.pdf", "pdf", Some("finance")).await.unwrap();
    assert_eq!(name, "finance/Q1_report.pdf");

    assert_eq!(
        storage.url(&name).unwrap(),
        "https://cdn.example.com/uploads/finance/Q1_report.pdf"
    );
    assert_eq!(
        storage.path(&name).unwrap(),
        std::path::absolute(temp_dir.path()).unwrap().join("finance/Q1_report.pdf")
    );

    let metadata = storage.metadata(&name).await.unwrap();
    assert_eq!(metadata.size, 3);
    assert!(metadata.modified.is_some());

    let file = storage.open(&name).await.unwrap();
    assert_eq!(file.url().unwrap(), storage.url(&name).unwrap());
    assert_eq!(file.metadata().await.unwrap().size, 3);
    file.delete().await.unwrap();
    assert!(!storage.exists(&name).await.unwrap());
}

#[tokio::test]
async fn test_capped_resolver_reports_conflict() {
    let temp_dir = tempdir().unwrap();
    let storage =
        filesystem_storage(temp_dir.path()).with_resolver(NameResolver::with_max_attempts(1));

    storage.save("a.txt", "0", None).await.unwrap();
    storage.save("a.txt", "1", None).await.unwrap();
    let err = storage.save("a.txt", "2", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_config_from_parts() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig::filesystem(temp_dir.path().join("store"), "/files");
    let storage = config.build().unwrap();

    let name = storage.save("hello.txt", "hi", None).await.unwrap();
    assert!(temp_dir.path().join("store/hello.txt").exists());
    assert_eq!(storage.url(&name).unwrap(), "/files/hello.txt");
}

#[tokio::test]
async fn test_root_with_parent_components() {
    let temp_dir = tempdir().unwrap();
    let storage = filesystem_storage(&temp_dir.path().join("a/../store"));

    let name = storage.save("x.txt", "hi", None).await.unwrap();
    assert_eq!(name, "x.txt");
    assert!(storage.exists("x.txt").await.unwrap());
    assert!(temp_dir.path().join("store/x.txt").exists());
}
