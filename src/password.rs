//! Password detection and the interactive retry loop.

use std::io;

use crate::io::ReadAt;
use crate::zip::ZipArchive;

/// Source of candidate passwords.
pub trait PasswordPrompt {
    /// Ask for a password. `Ok(None)` means the user chose to continue
    /// without one.
    fn ask(&mut self, attempt: usize, attempts: usize) -> io::Result<Option<String>>;
}

/// Prompt that never asks, for non-interactive runs.
pub struct NoPrompt;

impl PasswordPrompt for NoPrompt {
    fn ask(&mut self, _attempt: usize, _attempts: usize) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// Masked terminal prompt.
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn ask(&mut self, attempt: usize, attempts: usize) -> io::Result<Option<String>> {
        let prompt = if attempt == 1 {
            "Archive is encrypted. Password (Enter to skip)".to_string()
        } else {
            format!("Incorrect password, try again ({attempt}/{attempts})")
        };
        let password = dialoguer::Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| io::Error::other(e.to_string()))?;

        Ok(Some(password).filter(|p| !p.is_empty()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("incorrect password after {0} attempts")]
    Exhausted(usize),

    #[error("password prompt failed: {0}")]
    Prompt(#[from] io::Error),
}

/// Decide which password to use for `archive`.
///
/// A password given up front is returned unchecked so that wrong-password
/// failures are reported per entry. Otherwise, when the archive has
/// encrypted entries, `prompt` is asked up to `attempts` times and each
/// answer is verified with [`ZipArchive::check_password`].
pub async fn resolve_password<R, P>(
    archive: &ZipArchive<R>,
    supplied: Option<&str>,
    prompt: &mut P,
    attempts: usize,
) -> Result<Option<String>, PasswordError>
where
    R: ReadAt,
    P: PasswordPrompt + ?Sized,
{
    if let Some(password) = supplied {
        return Ok(Some(password.to_string()));
    }
    if !archive.requires_password() {
        return Ok(None);
    }

    for attempt in 1..=attempts {
        let Some(candidate) = prompt.ask(attempt, attempts)? else {
            log::info!("continuing without a password");
            return Ok(None);
        };
        if archive.check_password(candidate.as_bytes()).await {
            return Ok(Some(candidate));
        }
        log::warn!("password attempt {attempt}/{attempts} rejected");
    }

    Err(PasswordError::Exhausted(attempts))
}
