use std::collections::BTreeSet;

use crate::foundation::error::{TicketDocError, TicketDocResult};

/// Fallback for extensions missing from [`CONTENT_TYPES`].
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Normalized extension -> MIME type.
pub const CONTENT_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("pdf", "application/pdf"),
];

/// Lower-cased extension of `file_name` without the dot; empty when there is none.
pub fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn content_type_for(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Reject names whose extension is outside `allowed`. Returns the normalized extension.
pub fn check_allowed(file_name: &str, allowed: &BTreeSet<String>) -> TicketDocResult<String> {
    let ext = extension_of(file_name);
    if ext.is_empty() || !allowed.contains(&ext) {
        return Err(TicketDocError::unsupported(ext));
    }
    Ok(ext)
}

/// Reduce a client-provided file name to a safe ASCII stem and extension.
///
/// Directory components are dropped, whitespace becomes `_`, and anything outside
/// `[A-Za-z0-9._-]` is removed. Leading dots are trimmed so the result is never hidden.
pub fn secure_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('_');
        }
    }
    out.trim_start_matches(['.', '_']).to_string()
}

/// `<stem>_<8 hex chars>.<ext>`; the stem falls back to `file` when nothing safe remains.
pub fn unique_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = base.rsplit_once('.').unwrap_or((base, ""));
    let stem = secure_file_name(stem);
    let stem = if stem.is_empty() { "file" } else { stem.as_str() };
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    if ext.is_empty() {
        format!("{stem}_{suffix}")
    } else {
        format!("{stem}_{suffix}.{ext}")
    }
}

/// Undo [`unique_file_name`]: drop a trailing `_<8 lowercase hex>` from the stem.
///
/// Names without such a suffix, or whose stem would become empty, are returned unchanged.
pub fn strip_unique_suffix(file_name: &str) -> String {
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_name, None),
    };
    let original = stem.rsplit_once('_').and_then(|(head, tail)| {
        let is_suffix = tail.len() == 8
            && tail.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        (is_suffix && !head.is_empty()).then_some(head)
    });
    match (original, ext) {
        (Some(head), Some(ext)) => format!("{head}.{ext}"),
        (Some(head), None) => head.to_string(),
        (None, _) => file_name.to_string(),
    }
}

/// Validate a storage folder: relative, `/`-separated, no `.`/`..` segments.
pub fn normalize_folder(folder: &str) -> TicketDocResult<String> {
    let s = folder.replace('\\', "/");
    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(TicketDocError::validation("folder must not contain '..'"));
        }
        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(TicketDocError::validation(format!(
                "folder segment '{part}' has unsupported characters"
            )));
        }
        out.push(part);
    }
    if out.is_empty() {
        return Err(TicketDocError::validation("folder must be non-empty"));
    }
    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/storage/content_type.rs"]
mod tests;
