//! Line based unified diff.
use std::time::Duration;

use similar::{Algorithm, TextDiff};

/// Past this, the diff falls back to a coarser but still valid edit script.
const DIFF_TIMEOUT: Duration = Duration::from_millis(200);

/// Unified diff from `old` to `new`, with `context` unchanged lines around each change.
///
/// Returns an empty string when both texts have the same lines.
pub fn unified(old_name: &str, new_name: &str, old: &str, new: &str, context: usize) -> String {
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header(old_name, new_name)
        .to_string()
}
