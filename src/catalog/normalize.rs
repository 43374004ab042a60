//! Name normalisation shared by index build and lookup.
//!
//! Case-folds, turns every punctuation/symbol character into a separator and
//! collapses whitespace. The alias index only ever stores normalised keys, and
//! every lookup goes through the same function, so raw text never matches.

/// Normalise a drug/class name for indexing or lookup.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}
