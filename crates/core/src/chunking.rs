use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::ChunkRecord;

pub const DEFAULT_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub window_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: 400,
            overlap_chars: 60,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Splits normalized text into fixed-size character windows, each starting
/// `window - overlap` after the previous so context spanning a boundary is
/// kept. Text shorter than one window yields exactly one window; empty text
/// yields none.
pub fn window_text(normalized: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = normalized.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = config
        .window_chars
        .saturating_sub(config.overlap_chars)
        .max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.window_chars).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    windows
}

/// Chunks an extracted document page by page, in source order. Pure function
/// of its input: re-running it for the same document produces the same
/// ordinal chunk ids, so an index upsert overwrites rather than duplicates.
pub fn chunk_pages(
    document_id: &str,
    pages: &[PageText],
    producer: Option<&str>,
    config: ChunkingConfig,
) -> Result<Vec<ChunkRecord>, IngestError> {
    let category = producer.unwrap_or(DEFAULT_CATEGORY);

    let mut chunks = Vec::new();
    for page in pages {
        let normalized = normalize_whitespace(&page.text);
        for window in window_text(&normalized, config) {
            chunks.push(ChunkRecord {
                id: format!("{}-chunk-{}", document_id, chunks.len()),
                document_id: document_id.to_string(),
                text: window,
                page_number: Some(page.number),
                category: category.to_string(),
            });
        }
    }

    if chunks.is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn thousand_chars_make_three_overlapping_windows() {
        let text: String = std::iter::repeat('x').take(1000).collect();
        let windows = window_text(&text, ChunkingConfig::default());

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].chars().count(), 400);
        assert_eq!(windows[1].chars().count(), 400);
        // third window starts at 680 and runs to the end
        assert_eq!(windows[2].chars().count(), 320);
    }

    #[test]
    fn consecutive_windows_share_the_overlap() {
        let text: String = ('a'..='z').cycle().take(900).collect();
        let config = ChunkingConfig::default();
        let windows = window_text(&text, config);

        let first: Vec<char> = windows[0].chars().collect();
        let second: Vec<char> = windows[1].chars().collect();
        let tail: String = first[first.len() - config.overlap_chars..].iter().collect();
        let head: String = second[..config.overlap_chars].iter().collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn short_text_yields_one_window_with_everything() {
        let windows = window_text("visiting hours are 9 to 5", ChunkingConfig::default());
        assert_eq!(windows, vec!["visiting hours are 9 to 5".to_string()]);
    }

    #[test]
    fn chunk_ids_are_ordinal_per_document() {
        let pages = vec![page(1, "first page text"), page(2, "second page text")];
        let chunks = chunk_pages("doc-1", &pages, Some("Acrobat"), ChunkingConfig::default())
            .expect("chunking should succeed");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "doc-1-chunk-0");
        assert_eq!(chunks[1].id, "doc-1-chunk-1");
        assert_eq!(chunks[0].page_number, Some(1));
        assert_eq!(chunks[1].page_number, Some(2));
        assert!(chunks.iter().all(|chunk| chunk.category == "Acrobat"));
    }

    #[test]
    fn empty_pages_are_an_empty_document_error() {
        let pages = vec![page(1, "   \n\t ")];
        let result = chunk_pages("doc-1", &pages, None, ChunkingConfig::default());
        assert!(matches!(result, Err(IngestError::EmptyDocument)));
    }

    #[test]
    fn windows_cover_the_whole_input() {
        let text: String = ('a'..='z').cycle().take(1234).collect();
        let config = ChunkingConfig::default();
        let windows = window_text(&text, config);

        let mut reassembled = String::new();
        for (index, window) in windows.iter().enumerate() {
            if index + 1 < windows.len() {
                assert_eq!(window.chars().count(), config.window_chars);
            }
            let skip = if index == 0 { 0 } else { config.overlap_chars };
            reassembled.extend(window.chars().skip(skip));
        }
        assert_eq!(reassembled, text);
    }
}
