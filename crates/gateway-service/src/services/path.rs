//! Canonical request paths.
//!
//! The auth policy is chosen from the path as received, while the upstream
//! URL goes through a parser that resolves dot segments and treats `\` as a
//! separator. Paths where the two could disagree are refused outright.

use crate::errors::GatewayError;

/// Refuse paths containing dot segments (`.`, `..`, and their
/// percent-encoded forms), backslashes, or encoded separators.
///
/// # Errors
///
/// Returns `GatewayError::InvalidPath` if the path is not canonical.
pub fn ensure_canonical_path(path: &str) -> Result<(), GatewayError> {
    for segment in path.split('/') {
        let lowered = segment.to_ascii_lowercase();

        if lowered.contains('\\') || lowered.contains("%5c") || lowered.contains("%2f") {
            return Err(GatewayError::InvalidPath);
        }

        let decoded_dots = lowered.replace("%2e", ".");
        if decoded_dots == "." || decoded_dots == ".." {
            return Err(GatewayError::InvalidPath);
        }
    }
    Ok(())
}
