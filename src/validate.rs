//! Config file key checks: typo detection and extension-key routing.
//!
//! Every key in the file must be either bound to a field or declared to the
//! extension parser. Anything else is reported with its file path and a
//! best-effort line number.

use std::collections::BTreeSet;

use crate::error::LayerfigError;
use crate::file::LoadedFile;

/// Dotted keys of every leaf in `table`.
///
/// Arrays (including arrays of tables) are leaves. A sub-table is a leaf when
/// `is_leaf` says its dotted path is a key in its own right, so struct-shaped
/// values and extension sections are not split further.
pub fn file_keys(table: &toml::Table, is_leaf: impl Fn(&str) -> bool) -> Vec<String> {
    let mut keys = Vec::new();
    collect_keys(table, "", &is_leaf, &mut keys);
    keys
}

fn collect_keys(
    table: &toml::Table,
    prefix: &str,
    is_leaf: &impl Fn(&str) -> bool,
    out: &mut Vec<String>,
) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(sub) if !is_leaf(&dotted) => {
                collect_keys(sub, &dotted, is_leaf, out)
            }
            _ => out.push(dotted),
        }
    }
}

/// Check the file's keys against the bound and extension key sets.
///
/// Returns the extension keys present in the file, in file-key order.
pub(crate) fn check_file_keys(
    file: &LoadedFile,
    known: &BTreeSet<String>,
    extension: &BTreeSet<String>,
) -> Result<Vec<String>, LayerfigError> {
    let keys = file_keys(&file.table, |k| known.contains(k) || extension.contains(k));

    let mut routed = Vec::new();
    let mut errors = Vec::new();
    for key in keys {
        if known.contains(&key) {
            continue;
        }
        if extension.contains(&key) {
            routed.push(key);
            continue;
        }
        let line = find_key_line(&file.content, &key);
        errors.push(LayerfigError::InvalidKey {
            key,
            path: file.path.clone(),
            line,
        });
    }

    if errors.is_empty() {
        Ok(routed)
    } else {
        Err(LayerfigError::InvalidKeys(errors))
    }
}

/// Find the 1-indexed line number for a key in TOML content.
///
/// For a dotted key like `"database.typo"`, tracks the current `[section]` header
/// while scanning and only matches the leaf key when inside the correct section.
/// An `[[array.of.tables]]` header matching the whole key is also a hit.
///
/// This is a best-effort heuristic: it handles standard headers and bare key
/// assignments but not quoted keys or inline tables.
/// Returns 0 if the key cannot be located.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let segments: Vec<&str> = dotted_key.split('.').collect();
    let leaf = segments.last().copied().unwrap_or(dotted_key);
    let expected_section = &segments[..segments.len().saturating_sub(1)];

    let mut current_section: Vec<String> = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.starts_with("[[") {
            let header = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            if header == dotted_key {
                return i + 1;
            }
            current_section = header.split('.').map(|s| s.trim().to_string()).collect();
            continue;
        }
        if trimmed.starts_with('[') {
            let header = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            current_section = header.split('.').map(|s| s.trim().to_string()).collect();
            continue;
        }

        let in_right_section = expected_section.len() == current_section.len()
            && expected_section
                .iter()
                .zip(&current_section)
                .all(|(a, b)| *a == b);

        if in_right_section
            && let Some(after_key) = trimmed.strip_prefix(leaf)
            && after_key.trim_start().starts_with('=')
        {
            return i + 1;
        }
    }
    0
}
