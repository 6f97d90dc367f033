//! Chunk engine: normalized page text into overlapping, size-bounded chunks.

use serde::{Deserialize, Serialize};

use super::store::ChunkMetadata;
use crate::core::config::IngestSettings;

/// Configuration for the chunk engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<&IngestSettings> for ChunkConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// A text chunk with its page metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Character offset in the normalized page text
    pub start_offset: usize,
    /// Chunk index within the page
    pub chunk_index: usize,
}

/// Preferred cut points, strongest first. Headings cut before the marker,
/// everything else cuts after it.
const SEPARATORS: [(&str, bool); 7] = [
    (" ## ", true),
    (" # ", true),
    (". ", false),
    ("? ", false),
    ("! ", false),
    ("; ", false),
    (" ", false),
];

pub struct ChunkEngine {
    config: ChunkConfig,
}

impl ChunkEngine {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Normalize `text` and split it into chunks carrying `metadata`.
    pub fn collect_from_text(&self, text: &str, metadata: &ChunkMetadata) -> Vec<TextChunk> {
        let normalized = normalize_whitespace(text);
        self.split_into_chunks(&normalized, metadata)
    }

    /// Split text into overlapping chunks.
    fn split_into_chunks(&self, text: &str, metadata: &ChunkMetadata) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(chunk_size - 1);

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut start = 0;
        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let cut = if end < total_chars {
                find_cut(&chars, start, end)
            } else {
                end
            };

            let chunk_text: String = chars[start..cut].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    metadata: metadata.clone(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if cut >= total_chars {
                break;
            }

            let mut next = cut.saturating_sub(overlap);
            if next <= start {
                next = cut;
            }
            // start the overlap on a word boundary
            while next < cut && chars[next - 1] != ' ' {
                next += 1;
            }
            start = next;
        }

        chunks
    }
}

impl Default for ChunkEngine {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

/// Collapse every whitespace run (newlines included) into a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best cut position in `chars[start..end]`, searched in the second half.
fn find_cut(chars: &[char], start: usize, end: usize) -> usize {
    let search_start = start + (end - start) / 2;

    for (separator, before) in SEPARATORS.iter() {
        let sep: Vec<char> = separator.chars().collect();
        if end - search_start < sep.len() {
            continue;
        }
        let mut pos = end - sep.len();
        loop {
            if chars[pos..pos + sep.len()] == sep[..] {
                let cut = if *before { pos + 1 } else { pos + sep.len() };
                if cut > start {
                    return cut;
                }
            }
            if pos == search_start {
                break;
            }
            pos -= 1;
        }
    }

    end
}
