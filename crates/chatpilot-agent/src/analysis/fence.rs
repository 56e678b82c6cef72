/// Remove a surrounding Markdown code fence from model output.
///
/// Only the first fenced block is kept, and a leading `python` language tag
/// is dropped. Unfenced text is returned trimmed.
pub fn strip_code_fence(code: &str) -> String {
    let code = code.trim();
    let Some(rest) = code.strip_prefix("```") else {
        return code.to_string();
    };
    let inner = rest.split("```").next().unwrap_or(rest);
    let inner = match inner.strip_prefix("python") {
        Some(body) => body.trim(),
        None => inner,
    };
    inner.trim().to_string()
}
