//! Boundary-aware text chunker with overlap.
//!
//! Splits the policy document into chunks of at most `max_len` bytes,
//! preferring paragraph (`\n\n`) boundaries, then sentence (`. `)
//! boundaries, then single newlines. A hard character cut is used only
//! when a single sentence exceeds `max_len`.
//!
//! Each chunk's text is the exact byte slice
//! `document[start_offset..end_offset]`, and consecutive chunks overlap by
//! up to `overlap` bytes (re-anchored to the nearest split boundary), so:
//!
//! - `start_offset`s are non-decreasing,
//! - every chunk is at most `max_len` bytes,
//! - concatenating chunk texts after dropping each chunk's overlapped
//!   prefix reconstructs the document exactly.
//!
//! Pure function: no side effects, deterministic for identical inputs.

use crate::errors::{ChatError, Result};
use crate::models::Chunk;

/// Split `document` into overlapping chunks.
///
/// # Errors
///
/// - [`ChatError::Config`] when `max_len == 0` or `overlap >= max_len`.
/// - [`ChatError::MalformedDocument`] when the document is empty or
///   whitespace-only.
pub fn chunk(document: &str, max_len: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if max_len == 0 {
        return Err(ChatError::Config("max_len must be > 0".to_string()));
    }
    if overlap >= max_len {
        return Err(ChatError::Config(format!(
            "overlap ({overlap}) must be < max_len ({max_len})"
        )));
    }
    if document.trim().is_empty() {
        return Err(ChatError::MalformedDocument(
            "document is empty or whitespace-only".to_string(),
        ));
    }

    let points = split_points(document, max_len);
    Ok(pack(document, &points, max_len, overlap))
}

/// Candidate cut positions, sorted ascending, always containing `0` and
/// `document.len()`. Every gap between consecutive points is `<= max_len`.
fn split_points(document: &str, max_len: usize) -> Vec<usize> {
    let mut points = vec![0, document.len()];

    paragraph_cuts(document, &mut points);
    refine_oversized(document, &mut points, max_len, ". ");
    refine_oversized(document, &mut points, max_len, "\n");
    hard_cuts(document, &mut points, max_len);

    points.sort_unstable();
    points.dedup();
    points
}

/// Cut after every run of two or more newlines.
fn paragraph_cuts(document: &str, points: &mut Vec<usize>) {
    let bytes = document.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j] == b'\n' {
                j += 1;
            }
            points.push(j);
            i = j;
        } else {
            i += 1;
        }
    }
}

/// For every gap wider than `max_len`, cut after each occurrence of `sep`.
fn refine_oversized(document: &str, points: &mut Vec<usize>, max_len: usize, sep: &str) {
    points.sort_unstable();
    points.dedup();

    let mut extra = Vec::new();
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a <= max_len {
            continue;
        }
        let mut from = a;
        while let Some(pos) = document[from..b].find(sep) {
            let cut = from + pos + sep.len();
            if cut < b {
                extra.push(cut);
            }
            from = cut;
        }
    }
    points.extend(extra);
}

/// Last resort: cut oversized gaps every `max_len` bytes, snapped back to a
/// char boundary (with forced single-char progress for degenerate snaps).
fn hard_cuts(document: &str, points: &mut Vec<usize>, max_len: usize) {
    points.sort_unstable();
    points.dedup();

    let mut extra = Vec::new();
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a <= max_len {
            continue;
        }
        let mut cut = a;
        loop {
            let mut next = snap_to_char_boundary(document, (cut + max_len).min(b));
            if next <= cut {
                next = document[cut..]
                    .char_indices()
                    .nth(1)
                    .map(|(i, _)| cut + i)
                    .unwrap_or(b);
            }
            if next >= b {
                break;
            }
            extra.push(next);
            cut = next;
        }
    }
    points.extend(extra);
}

/// Greedily pack the units between split points into chunks, backing the
/// start of each subsequent chunk up by at most `overlap` bytes.
fn pack(document: &str, points: &[usize], max_len: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut start_idx = 0usize;

    loop {
        // Extend the chunk unit by unit while it still fits.
        let mut j = start_idx;
        while j + 1 < points.len() && points[j + 1] - start <= max_len {
            j += 1;
        }
        if j == start_idx {
            // Cannot happen after hard_cuts, but never emit an empty chunk.
            j += 1;
        }
        let end = points[j];
        chunks.push(make_chunk(chunks.len(), document, start, end));

        if end >= document.len() {
            break;
        }

        // Back up to the largest boundary within `overlap` of the end that
        // still leaves room for the next unit; fall back to no overlap.
        let next_unit_end = points[j + 1];
        let mut new_start = end;
        let mut new_idx = j;
        for bi in (start_idx..j).rev() {
            let b = points[bi];
            if end - b > overlap {
                break;
            }
            if next_unit_end - b <= max_len {
                new_start = b;
                new_idx = bi;
                break;
            }
        }
        start = new_start;
        start_idx = new_idx;
    }

    chunks
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn make_chunk(index: usize, document: &str, start: usize, end: usize) -> Chunk {
    Chunk {
        id: format!("chunk-{index}"),
        text: document[start..end].to_string(),
        start_offset: start,
        end_offset: end,
    }
}
