//! Chat request validation.
//!
//! Everything here runs before the event stream opens, so a rejected
//! request gets a plain 400 instead of an `error` event.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{MAX_FILES_PER_REQUEST, MAX_QUESTION_CHARS};
use crate::error::{Result, ServerError};

/// File extensions accepted for analysis.
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Strip markup and control characters, then check the length.
pub fn sanitize_question(raw: &str) -> Result<String> {
    let without_tags = match HTML_TAG.as_ref() {
        Some(re) => re.replace_all(raw, ""),
        None => Cow::Borrowed(raw),
    };
    let cleaned: String = without_tags
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .collect();
    let question = cleaned.trim();

    if question.is_empty() {
        return Err(ServerError::BadRequest(
            "Question cannot be empty or whitespace".to_string(),
        ));
    }
    let chars = question.chars().count();
    if chars > MAX_QUESTION_CHARS {
        return Err(ServerError::BadRequest(format!(
            "Question is {chars} characters; the limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(question.to_string())
}

/// C0 and C1 controls, DEL included.
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{1F}' | '\u{7F}'..='\u{9F}')
}

/// Resolve uploaded file names to paths under `upload_dir/<session_id>/`.
pub fn resolve_files(upload_dir: &Path, session_id: &str, files: &[String]) -> Result<Vec<String>> {
    if files.len() > MAX_FILES_PER_REQUEST {
        return Err(ServerError::BadRequest(format!(
            "Maximum {MAX_FILES_PER_REQUEST} files allowed"
        )));
    }
    if !files.is_empty() {
        check_path_segment(session_id, "session id")?;
    }

    let session_dir = upload_dir.join(session_id);
    files
        .iter()
        .map(|name| {
            check_path_segment(name, "file name")?;
            let extension = Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
                return Err(ServerError::BadRequest(format!(
                    "File type '.{extension}' not supported. Use CSV or Excel."
                )));
            }
            Ok(path_string(session_dir.join(name)))
        })
        .collect()
}

/// A single normal path component: no separators, `..`, or roots.
fn check_path_segment(value: &str, what: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(()),
        _ => Err(ServerError::BadRequest(format!("Invalid {what}: '{value}'"))),
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
