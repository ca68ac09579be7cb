//! Sliding-window chunking of extracted document text.
//!
//! Chunks are character windows with a fixed overlap. When page texts are
//! available, each chunk is stamped with the 1-based page its first
//! character falls on.

/// A contiguous slice of extracted document text.
///
/// Created once per query and kept in memory for the query's duration;
/// chunks are not persisted.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position in the chunk sequence (0-based).
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// 1-based page the chunk starts on, when known.
    pub page: Option<u32>,
}

/// Splits `text` into overlapping character windows.
///
/// `overlap` is clamped below `chunk_size` so the window always advances.
/// At most `max_chunks` windows are produced.
#[must_use]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize, max_chunks: usize) -> Vec<Chunk> {
    chunk_with_pages(&[text.to_string()], chunk_size, overlap, max_chunks)
        .into_iter()
        .map(|c| Chunk { page: None, ..c })
        .collect()
}

/// Splits page texts into overlapping character windows, stamping each
/// chunk with the page its starting character belongs to.
///
/// Pages are joined with double newlines before windowing so a chunk may
/// span a page boundary; the stamped page is where the chunk begins.
#[must_use]
pub fn chunk_with_pages(
    pages: &[String],
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
) -> Vec<Chunk> {
    if pages.iter().all(|p| p.trim().is_empty()) || chunk_size == 0 {
        return Vec::new();
    }

    let joined = pages.join("\n\n");
    let chars: Vec<char> = joined.chars().collect();

    // Cumulative char offset at which each page starts in the joined text.
    let mut page_starts = Vec::with_capacity(pages.len());
    let mut offset = 0usize;
    for (i, p) in pages.iter().enumerate() {
        page_starts.push(offset);
        offset += p.chars().count();
        if i + 1 < pages.len() {
            offset += 2; // the "\n\n" separator
        }
    }

    let step = chunk_size.saturating_sub(overlap.min(chunk_size.saturating_sub(1)));
    let step = step.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() && chunks.len() < max_chunks {
        let end = (start + chunk_size).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        let page = page_of(&page_starts, start);
        chunks.push(Chunk {
            index: chunks.len(),
            text: text.trim().to_string(),
            page,
        });
        start += step;
    }

    chunks.retain(|c| !c.text.is_empty());
    for (i, c) in chunks.iter_mut().enumerate() {
        c.index = i;
    }
    chunks
}

/// Returns the 1-based page containing the given char offset.
fn page_of(page_starts: &[usize], offset: usize) -> Option<u32> {
    if page_starts.is_empty() {
        return None;
    }
    let idx = match page_starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    };
    u32::try_from(idx + 1).ok()
}
