mod common;

use std::fs;
use std::sync::atomic::AtomicBool;

use common::{build_zip, open_memory, options, stamp};
use zipman::selection::parse_selection;
use zipman::zip::{WriteOptions, ZipWriter};
use zipman::{SelectionSet, SelectiveExtractor, SkipReason};

const SAMPLE: &[(&str, &[u8])] = &[
    ("zero.txt", b"0"),
    ("one.txt", b"11"),
    ("dir/", b""),
    ("dir/three.txt", b"333"),
    ("four.txt", b"4444"),
    ("five.txt", b"55555"),
];

#[tokio::test]
async fn extracts_only_selected_entries() {
    let archive = open_memory(build_zip(SAMPLE, options(6, None))).await;
    let dest = tempfile::tempdir().unwrap();

    let selection = parse_selection("0,3-4", archive.len()).unwrap();
    let mut calls = Vec::new();
    let result = SelectiveExtractor::new(&archive, dest.path())
        .run(&selection, |done, total| calls.push((done, total)))
        .await;

    assert!(!result.is_failed());
    assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(result.extracted.len(), 3);
    assert_eq!(fs::read(dest.path().join("zero.txt")).unwrap(), b"0");
    assert_eq!(fs::read(dest.path().join("dir/three.txt")).unwrap(), b"333");
    assert_eq!(fs::read(dest.path().join("four.txt")).unwrap(), b"4444");
    assert!(!dest.path().join("one.txt").exists());
    assert!(!dest.path().join("five.txt").exists());
}

#[tokio::test]
async fn extract_all_creates_directories() {
    let archive = open_memory(build_zip(SAMPLE, options(0, None))).await;
    let dest = tempfile::tempdir().unwrap();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .run(&SelectionSet::all(archive.len()), |_, _| {})
        .await;

    assert_eq!(result.extracted.len(), 6);
    assert!(result.skipped.is_empty() && result.failed.is_empty());
    assert!(dest.path().join("dir").is_dir());
}

#[tokio::test]
async fn traversal_entries_are_rejected_and_extraction_continues() {
    let archive = open_memory(build_zip(
        &[
            ("good.txt", b"fine"),
            ("../escape.txt", b"evil"),
            ("/abs.txt", b"evil"),
            ("nested/../../up.txt", b"evil"),
            ("last.txt", b"still here"),
        ],
        options(6, None),
    ))
    .await;
    let root = tempfile::tempdir().unwrap();
    let dest = root.path().join("out");

    let mut calls = Vec::new();
    let result = SelectiveExtractor::new(&archive, &dest)
        .run(&SelectionSet::all(archive.len()), |done, total| {
            calls.push((done, total))
        })
        .await;

    assert_eq!(result.traversal_rejections(), 3);
    assert!(result
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::PathTraversalRejected));
    assert_eq!(calls, vec![(1, 5), (2, 5)]);
    assert!(!root.path().join("escape.txt").exists());
    assert!(!root.path().join("up.txt").exists());
    assert_eq!(fs::read(dest.join("last.txt")).unwrap(), b"still here");
    assert!(!result.is_failed());
}

#[tokio::test]
async fn all_entries_fail_without_password() {
    let archive = open_memory(build_zip(
        &[("a.txt", b"alpha"), ("b.txt", b"beta")],
        options(6, Some("correct")),
    ))
    .await;
    let selection = SelectionSet::all(archive.len());

    for password in [None, Some("wrong")] {
        let dest = tempfile::tempdir().unwrap();
        let mut calls = 0;
        let result = SelectiveExtractor::new(&archive, dest.path())
            .password(password)
            .run(&selection, |_, _| calls += 1)
            .await;

        assert!(result.is_failed());
        assert_eq!(calls, 0);
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.password_failures(), 2);
        assert!(!dest.path().join("a.txt").exists());
    }
}

#[tokio::test]
async fn created_directories_do_not_mask_password_failures() {
    let archive = open_memory(build_zip(
        &[("docs/", b""), ("docs/a.txt", b"alpha"), ("b.txt", b"beta")],
        options(6, Some("correct")),
    ))
    .await;
    let dest = tempfile::tempdir().unwrap();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .password(Some("wrong"))
        .run(&SelectionSet::all(archive.len()), |_, _| {})
        .await;

    assert_eq!(result.extracted.len(), 1);
    assert!(result.extracted[0].is_directory);
    assert_eq!(result.password_failures(), 2);
    assert!(result.is_failed());
}

#[tokio::test]
async fn correct_password_extracts_everything() {
    let archive = open_memory(build_zip(
        &[("a.txt", b"alpha"), ("b.txt", b"beta")],
        options(6, Some("correct")),
    ))
    .await;
    let dest = tempfile::tempdir().unwrap();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .password(Some("correct"))
        .run(&SelectionSet::all(2), |_, _| {})
        .await;

    assert!(!result.is_failed());
    assert_eq!(fs::read(dest.path().join("b.txt")).unwrap(), b"beta");
}

#[tokio::test]
async fn partial_password_failures_do_not_fail_the_run() {
    let mut writer = ZipWriter::new(Vec::new(), WriteOptions::default());
    writer.add_file("open.txt", b"open", stamp()).unwrap();
    writer.set_options(options(6, Some("pw")));
    writer.add_file("locked.txt", b"locked", stamp()).unwrap();
    let archive = open_memory(writer.finish().unwrap()).await;
    let dest = tempfile::tempdir().unwrap();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .run(&SelectionSet::all(2), |_, _| {})
        .await;

    assert!(!result.is_failed());
    assert_eq!(result.extracted.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].index, 1);
    assert!(result.failed[0].error.is_password_error());
}

#[tokio::test]
async fn existing_files_respect_overwrite_policy() {
    let archive = open_memory(build_zip(&[("a.txt", b"new")], options(0, None))).await;
    let dest = tempfile::tempdir().unwrap();
    fs::write(dest.path().join("a.txt"), b"old").unwrap();

    let kept = SelectiveExtractor::new(&archive, dest.path())
        .run(&SelectionSet::all(1), |_, _| {})
        .await;
    assert_eq!(kept.skipped[0].reason, SkipReason::AlreadyExists);
    assert_eq!(fs::read(dest.path().join("a.txt")).unwrap(), b"old");

    let replaced = SelectiveExtractor::new(&archive, dest.path())
        .overwrite(true)
        .run(&SelectionSet::all(1), |_, _| {})
        .await;
    assert_eq!(replaced.extracted.len(), 1);
    assert_eq!(fs::read(dest.path().join("a.txt")).unwrap(), b"new");
}

#[tokio::test]
async fn junk_paths_flatten_output() {
    let archive = open_memory(build_zip(SAMPLE, options(6, None))).await;
    let dest = tempfile::tempdir().unwrap();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .junk_paths(true)
        .run(&parse_selection("2-3", archive.len()).unwrap(), |_, _| {})
        .await;

    assert_eq!(result.extracted.len(), 1);
    assert_eq!(fs::read(dest.path().join("three.txt")).unwrap(), b"333");
    assert!(!dest.path().join("dir").exists());
}

#[tokio::test]
async fn cancelled_run_reports_partial_result() {
    let archive = open_memory(build_zip(SAMPLE, options(6, None))).await;
    let dest = tempfile::tempdir().unwrap();
    let cancel = AtomicBool::new(true);

    let result = SelectiveExtractor::new(&archive, dest.path())
        .cancel_flag(&cancel)
        .run(&SelectionSet::all(archive.len()), |_, _| {})
        .await;

    assert!(result.cancelled);
    assert!(result.extracted.is_empty());
    assert!(!dest.path().join("zero.txt").exists());
}

#[tokio::test]
async fn unusable_destination_is_fatal() {
    let archive = open_memory(build_zip(SAMPLE, options(6, None))).await;
    let root = tempfile::tempdir().unwrap();
    let not_a_dir = root.path().join("file");
    fs::write(&not_a_dir, b"x").unwrap();

    let result = SelectiveExtractor::new(&archive, &not_a_dir)
        .run(&SelectionSet::all(archive.len()), |_, _| {})
        .await;

    assert!(result.fatal.is_some());
    assert!(result.is_failed());
    assert!(result.extracted.is_empty());
}

#[tokio::test]
async fn write_error_stops_remaining_entries() {
    let archive = open_memory(build_zip(
        &[("blocked/x.txt", b"x"), ("later.txt", b"later")],
        options(6, None),
    ))
    .await;
    let dest = tempfile::tempdir().unwrap();
    // A file where a directory is needed makes the first write fail.
    fs::write(dest.path().join("blocked"), b"").unwrap();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .run(&SelectionSet::all(2), |_, _| {})
        .await;

    assert!(result.fatal.is_some());
    assert!(!dest.path().join("later.txt").exists());
}

#[tokio::test]
async fn stale_indices_are_skipped() {
    let archive = open_memory(build_zip(&[("a.txt", b"a")], options(0, None))).await;
    let dest = tempfile::tempdir().unwrap();
    let selection: SelectionSet = [0, 7].into_iter().collect();

    let result = SelectiveExtractor::new(&archive, dest.path())
        .run(&selection, |_, _| {})
        .await;

    assert_eq!(result.extracted.len(), 1);
    assert_eq!(result.skipped[0].reason, SkipReason::MissingEntry);
}
