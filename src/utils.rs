/// ASCII-only lowercase copy of a byte slice. Non-ASCII bytes pass through
/// unchanged; command names are ASCII by Redis convention.
pub(crate) fn lower_copy(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b.to_ascii_lowercase()).collect()
}
