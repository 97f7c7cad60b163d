use std::collections::BTreeSet;

/// Bring a candidate pool into canonical order: duplicates dropped, tokens
/// sorted by their bytes.
///
/// The Selector indexes into this order, so any verifier that rebuilds the
/// same set of tokens resolves the same index to the same token regardless of
/// how the underlying store iterated them.
pub fn canonicalize<I, S>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tokens
        .into_iter()
        .map(Into::into)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
