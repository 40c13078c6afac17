//! Sibling name uniqueness resolution.
//!
//! Given the names already taken among a parent's direct children, decide
//! whether a candidate is legal and, when asked, derive a collision-free
//! variant. All length arithmetic is done in characters so multi-byte
//! names are budgeted correctly.

use std::collections::HashMap;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::types::NodeId;
use treehub_entity::node::name::MAX_NAME_CHARS;

/// The suffix appended to resolve copy collisions ("Report.pdf" becomes
/// "Report copy.pdf").
pub const COPY_SUFFIX: &str = " copy";

/// Whether `candidate` is unused among `siblings`, ignoring the sibling
/// identified by `exclude` (so a node can keep its own name).
pub fn is_unique(
    candidate: &str,
    siblings: &HashMap<String, NodeId>,
    exclude: Option<NodeId>,
) -> bool {
    match siblings.get(candidate) {
        None => true,
        Some(holder) => exclude == Some(*holder),
    }
}

/// Derive a name not present in `siblings`.
///
/// An unused candidate is returned unchanged. Otherwise the candidate is
/// split at its *first* `.` into base and extension (the extension keeps
/// any further dots, so `a.tar.gz` splits into `a` + `.tar.gz`), and
/// `base + suffix + extension` is tried, then `base + suffix + " " + n +
/// extension` for n = 1, 2, 3, ... The base is truncated when needed to
/// stay within the 255-character budget; if the suffix and extension
/// alone leave no room for a single base character, the search fails
/// terminally with a validation error.
pub fn make_unique(
    candidate: &str,
    siblings: &HashMap<String, NodeId>,
    suffix: &str,
) -> AppResult<String> {
    if is_unique(candidate, siblings, None) {
        return Ok(candidate.to_string());
    }

    let (base, extension) = split_extension(candidate);

    let mut counter: Option<u64> = None;
    loop {
        let tail = match counter {
            None => format!("{suffix}{extension}"),
            Some(n) => format!("{suffix} {n}{extension}"),
        };
        let tail_chars = tail.chars().count();
        if tail_chars >= MAX_NAME_CHARS {
            return Err(AppError::validation(format!(
                "Cannot derive a unique name for '{candidate}': no room left in the \
                 {MAX_NAME_CHARS} character budget"
            )));
        }

        let budget = MAX_NAME_CHARS - tail_chars;
        let trimmed: String = base.chars().take(budget).collect();
        if trimmed.is_empty() {
            return Err(AppError::validation(format!(
                "Cannot derive a unique name for '{candidate}': base would be empty"
            )));
        }

        let attempt = format!("{trimmed}{tail}");
        if is_unique(&attempt, siblings, None) {
            return Ok(attempt);
        }
        counter = Some(counter.map_or(1, |n| n + 1));
    }
}

/// Split a name at its first `.` into (base, extension-with-dot). A name
/// without a dot (or starting with one) keeps everything in the base.
fn split_extension(name: &str) -> (&str, &str) {
    match name.char_indices().find(|(i, c)| *c == '.' && *i > 0) {
        Some((i, _)) => (&name[..i], &name[i..]),
        None => (name, ""),
    }
}
