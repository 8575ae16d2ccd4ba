mod common;

use std::fs;
use std::sync::Arc;

use common::options;
use zipman::create::{CreateError, SourceFile, collect_sources, create_archive, zip_output_path};
use zipman::{LocalFileReader, SelectionSet, SelectiveExtractor, ZipArchive};

fn populate(root: &std::path::Path) {
    fs::create_dir_all(root.join("notes/old")).unwrap();
    fs::write(root.join("readme.md"), b"# hello\n").unwrap();
    fs::write(root.join("notes/today.txt"), b"buy milk".repeat(64)).unwrap();
    fs::write(root.join("notes/old/2019.txt"), b"nothing").unwrap();
}

async fn open(path: &std::path::Path) -> ZipArchive<LocalFileReader> {
    let reader = LocalFileReader::new(path).unwrap();
    ZipArchive::open(Arc::new(reader)).await.unwrap()
}

#[tokio::test]
async fn directory_round_trips_through_an_archive() {
    let work = tempfile::tempdir().unwrap();
    let source = work.path().join("src");
    populate(&source);
    let output = zip_output_path(&work.path().join("bundle"));

    let sources = collect_sources(&source).unwrap();
    let mut progress = Vec::new();
    let summary = create_archive(&sources, &output, options(6, None), |done, total| {
        progress.push((done, total))
    })
    .unwrap();

    assert_eq!(summary.files, 3);
    assert_eq!(summary.total_size, 8 + 8 * 64 + 7);
    assert_eq!(summary.archive_size, fs::metadata(&output).unwrap().len());
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

    let archive = open(&output).await;
    let names: Vec<_> = archive.entries().iter().map(|e| e.file_name.clone()).collect();
    assert_eq!(names, vec!["notes/old/2019.txt", "notes/today.txt", "readme.md"]);
    assert_eq!(
        archive.read_entry(&archive.entries()[1], None).await.unwrap(),
        b"buy milk".repeat(64)
    );
    assert_ne!(archive.entries()[2].formatted_date(), "Unknown");
}

#[tokio::test]
async fn encrypted_archive_extracts_with_its_password() {
    let work = tempfile::tempdir().unwrap();
    let source = work.path().join("secret.txt");
    fs::write(&source, b"launch codes").unwrap();
    let output = work.path().join("secret.zip");

    let sources = collect_sources(&source).unwrap();
    create_archive(&sources, &output, options(9, Some("pw")), |_, _| {}).unwrap();

    let archive = open(&output).await;
    assert!(archive.requires_password());
    assert_eq!(archive.entries()[0].file_name, "secret.txt");

    let dest = work.path().join("out");
    let result = SelectiveExtractor::new(&archive, &dest)
        .password(Some("pw"))
        .run(&SelectionSet::all(archive.len()), |_, _| {})
        .await;
    assert!(!result.is_failed());
    assert_eq!(fs::read(dest.join("secret.txt")).unwrap(), b"launch codes");
}

#[tokio::test]
async fn previous_output_inside_the_source_is_not_packed() {
    let work = tempfile::tempdir().unwrap();
    populate(work.path());
    let output = work.path().join("self.zip");
    fs::write(&output, b"stale archive").unwrap();

    let sources = collect_sources(work.path()).unwrap();
    assert!(sources.iter().any(|s| s.name == "self.zip"));

    let summary = create_archive(&sources, &output, options(0, None), |_, _| {}).unwrap();
    assert_eq!(summary.files, 3);

    let archive = open(&output).await;
    assert!(archive.entries().iter().all(|e| e.file_name != "self.zip"));
}

#[test]
fn failed_create_keeps_the_existing_archive() {
    let work = tempfile::tempdir().unwrap();
    let good = work.path().join("good.txt");
    fs::write(&good, b"fine").unwrap();
    let output = work.path().join("keep.zip");
    fs::write(&output, b"previous archive").unwrap();

    let sources = vec![
        SourceFile {
            path: good,
            name: "good.txt".to_string(),
        },
        SourceFile {
            path: work.path().join("vanished.txt"),
            name: "vanished.txt".to_string(),
        },
    ];
    let err = create_archive(&sources, &output, options(6, None), |_, _| {}).unwrap_err();

    assert!(matches!(err, CreateError::Read { .. }));
    assert_eq!(fs::read(&output).unwrap(), b"previous archive");
    let leftovers: Vec<_> = fs::read_dir(work.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 2, "{leftovers:?}");
}
