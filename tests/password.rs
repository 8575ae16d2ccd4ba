mod common;

use std::collections::VecDeque;
use std::io;

use common::{build_zip, open_memory, options};
use zipman::password::{NoPrompt, PasswordError, PasswordPrompt, resolve_password};
use zipman::{SelectionSet, SelectiveExtractor};

/// Replays canned answers and records how often it was asked.
struct ScriptedPrompt {
    answers: VecDeque<Option<String>>,
    asked: usize,
}

impl ScriptedPrompt {
    fn new(answers: &[Option<&str>]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.map(str::to_string)).collect(),
            asked: 0,
        }
    }
}

impl PasswordPrompt for ScriptedPrompt {
    fn ask(&mut self, _attempt: usize, _attempts: usize) -> io::Result<Option<String>> {
        self.asked += 1;
        Ok(self.answers.pop_front().flatten())
    }
}

async fn encrypted_archive() -> zipman::ZipArchive<zipman::MemoryReader> {
    open_memory(build_zip(
        &[("a.txt", b"alpha"), ("b.txt", b"beta beta")],
        options(6, Some("open sesame")),
    ))
    .await
}

#[tokio::test]
async fn supplied_password_is_used_without_asking() {
    let archive = encrypted_archive().await;
    let mut prompt = ScriptedPrompt::new(&[]);

    let password = resolve_password(&archive, Some("anything"), &mut prompt, 3)
        .await
        .unwrap();
    assert_eq!(password.as_deref(), Some("anything"));
    assert_eq!(prompt.asked, 0);
}

#[tokio::test]
async fn plain_archive_needs_no_password() {
    let archive = open_memory(build_zip(&[("a.txt", b"alpha")], options(6, None))).await;
    let mut prompt = ScriptedPrompt::new(&[Some("unused")]);

    let password = resolve_password(&archive, None, &mut prompt, 3).await.unwrap();
    assert_eq!(password, None);
    assert_eq!(prompt.asked, 0);
}

#[tokio::test]
async fn retries_until_the_password_matches() {
    let archive = encrypted_archive().await;
    let mut prompt = ScriptedPrompt::new(&[Some("nope"), Some("open sesame")]);

    let password = resolve_password(&archive, None, &mut prompt, 3).await.unwrap();
    assert_eq!(password.as_deref(), Some("open sesame"));
    assert_eq!(prompt.asked, 2);
}

#[tokio::test]
async fn gives_up_after_the_attempt_limit() {
    let archive = encrypted_archive().await;
    let mut prompt = ScriptedPrompt::new(&[Some("a"), Some("b"), Some("c"), Some("open sesame")]);

    let err = resolve_password(&archive, None, &mut prompt, 3).await.unwrap_err();
    assert!(matches!(err, PasswordError::Exhausted(3)));
    assert_eq!(prompt.asked, 3);
}

#[tokio::test]
async fn skipping_the_prompt_continues_without_password() {
    let archive = encrypted_archive().await;
    let mut prompt = ScriptedPrompt::new(&[None]);

    let password = resolve_password(&archive, None, &mut prompt, 3).await.unwrap();
    assert_eq!(password, None);
    assert_eq!(prompt.asked, 1);

    let password = resolve_password(&archive, None, &mut NoPrompt, 3).await.unwrap();
    assert_eq!(password, None);
}

#[tokio::test]
async fn damaged_entry_does_not_block_the_password_check() {
    let mut bytes = build_zip(
        &[("tiny.txt", b"t"), ("big.txt", &[b'x'; 4096])],
        options(6, Some("pw")),
    );
    // Break the local header signature of the smallest entry.
    bytes[0] ^= 0xFF;
    let archive = open_memory(bytes).await;

    let mut prompt = ScriptedPrompt::new(&[Some("pw")]);
    let password = resolve_password(&archive, None, &mut prompt, 3).await.unwrap();
    assert_eq!(password.as_deref(), Some("pw"));
    assert_eq!(prompt.asked, 1);
    assert!(!archive.check_password(b"wrong").await);

    let dest = tempfile::tempdir().unwrap();
    let result = SelectiveExtractor::new(&archive, dest.path())
        .password(password.as_deref())
        .run(&SelectionSet::all(archive.len()), |_, _| {})
        .await;
    assert_eq!(result.extracted.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "tiny.txt");
}

#[tokio::test]
async fn password_is_accepted_when_no_entry_can_verify_it() {
    let mut bytes = build_zip(&[("only.txt", b"data")], options(0, Some("pw")));
    bytes[0] ^= 0xFF;
    let archive = open_memory(bytes).await;

    assert!(archive.check_password(b"anything").await);
}
