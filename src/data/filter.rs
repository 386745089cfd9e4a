use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Index resolution: metadata names → feature table rows
// ---------------------------------------------------------------------------

/// Row positions for every metadata name found in `lookup`, in metadata
/// order. Names with no row are skipped.
pub fn audio_indexes<S: AsRef<str>>(names: &[S], lookup: &HashMap<&str, usize>) -> Vec<usize> {
    names
        .iter()
        .filter_map(|name| lookup.get(name.as_ref()).copied())
        .collect()
}

// ---------------------------------------------------------------------------
// Source filtering
// ---------------------------------------------------------------------------

/// Keep the indexes whose source label is one of `sources`, preserving order.
///
/// An empty `sources` list keeps nothing.
pub fn source_indexes<S: AsRef<str>>(
    indexes: &[usize],
    source_labels: &[String],
    sources: &[S],
) -> Vec<usize> {
    let accepted: HashSet<&str> = sources.iter().map(AsRef::as_ref).collect();
    indexes
        .iter()
        .copied()
        .filter(|&i| accepted.contains(source_labels[i].as_str()))
        .collect()
}
