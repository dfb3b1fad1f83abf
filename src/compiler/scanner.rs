/// Highest explicit `$N` index accepted as a parameter reference.
pub(super) const MAX_PARAM_INDEX: usize = u16::MAX as usize;

/// Scan a run of ASCII digits starting at `start`, returning the end offset and the digits.
pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

/// Scan an explicit 1-based parameter index following a `$`.
///
/// Digits are consumed greedily; `$0`, overflowing and out-of-range indices are not
/// parameter references.
pub(super) fn scan_index(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let (end, digits) = scan_digits(bytes, start)?;
    let index: usize = digits.parse().ok()?;
    (1..=MAX_PARAM_INDEX)
        .contains(&index)
        .then_some((end, index))
}
