//! Character-window pagination over a normalized document.
//!
//! The cursor is entirely caller-held: a window is a pure function of
//! `(full_text, offset, chunk_size)`, so resuming is just calling again with `next_offset`.

use websift_core::FetchResult;

/// Byte index of the `n`-th character of `s`, or `s.len()` when `n` is past the end.
fn byte_index_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Clamp a caller-supplied offset into `[0, total]`.
pub fn clamp_offset(offset: i64, total: usize) -> usize {
    usize::try_from(offset.max(0))
        .unwrap_or(usize::MAX)
        .min(total)
}

/// Slice `[offset, offset + chunk_size)` characters out of `full`.
///
/// - negative offsets read from the start
/// - offsets at or past the end yield an empty, non-truncated window
/// - `chunk_size` of zero is treated as one so the cursor always advances
pub fn page(full: &str, offset: i64, chunk_size: usize) -> FetchResult {
    let total_length = full.chars().count();
    let offset = clamp_offset(offset, total_length);
    let chunk_size = chunk_size.max(1);

    let start = byte_index_of_char(full, offset);
    let tail = &full[start..];
    let end = byte_index_of_char(tail, chunk_size);
    let content = tail[..end].to_string();

    let content_length = content.chars().count();
    let next_offset = offset + content_length;
    FetchResult {
        content,
        content_length,
        is_truncated: next_offset < total_length,
        offset,
        next_offset: Some(next_offset),
        total_length,
        success: true,
    }
}
