//! Fixed-window text chunking.
//!
//! Sizes and overlaps are measured in characters, not bytes, so a chunk
//! boundary never splits a multi-byte character.

use super::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Fails when `chunk_size` is zero or `overlap >= chunk_size`; either
    /// would keep the window from advancing.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(PipelineError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Only text strictly longer than one chunk is split.
    pub fn needs_chunking(&self, text: &str) -> bool {
        text.chars().count() > self.chunk_size
    }

    /// Number of chunks [`split`](Self::split) yields for a text of
    /// `char_len` characters.
    pub fn chunk_count(&self, char_len: usize) -> usize {
        if char_len <= self.chunk_size {
            1
        } else {
            (char_len - self.overlap).div_ceil(self.chunk_size - self.overlap)
        }
    }

    /// Splits `text` into windows of `chunk_size` characters where each
    /// window starts `overlap` characters before the previous one ended.
    ///
    /// Text no longer than `chunk_size` (including empty text) comes back as
    /// a single chunk.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        // Byte offset of every char boundary, including the end of the text
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;

        if len <= self.chunk_size {
            return vec![text];
        }

        let mut chunks = Vec::with_capacity(self.chunk_count(len));
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            chunks.push(&text[bounds[start]..bounds[end]]);
            if end == len {
                break;
            }
            start = end - self.overlap;
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuilds the text by dropping each later chunk's leading overlap.
    fn reconstruct(chunks: &[&str], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_rejects_zero_size() {
        assert_eq!(Chunker::new(0, 0), Err(PipelineError::ZeroChunkSize));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            Chunker::new(10, 10),
            Err(PipelineError::OverlapTooLarge {
                chunk_size: 10,
                overlap: 10
            })
        ));
        assert!(Chunker::new(10, 11).is_err());
        assert!(Chunker::new(10, 9).is_ok());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert_eq!(chunker.split("hello"), vec!["hello"]);
        assert!(!chunker.needs_chunking("hello"));
    }

    #[test]
    fn test_empty_text_is_single_empty_chunk() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert_eq!(chunker.split(""), vec![""]);
    }

    #[test]
    fn test_exact_chunk_size_is_not_split() {
        let chunker = Chunker::new(10, 0).unwrap();
        let text = "a".repeat(10);
        assert!(!chunker.needs_chunking(&text));
        assert_eq!(chunker.split(&text).len(), 1);
    }

    #[test]
    fn test_two_chunks_at_double_size_minus_overlap() {
        let chunker = Chunker::new(10, 3).unwrap();
        let text = "abcdefghijklmnopq"; // 17 = 2 * 10 - 3
        let chunks = chunker.split(text);

        assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq"]);
        assert_eq!(chunker.chunk_count(text.len()), 2);
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        for (size, overlap) in [(10, 0), (10, 3), (7, 6), (100, 20)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            for len in 0..400 {
                let text = "x".repeat(len);
                let chunks = chunker.split(&text);
                assert_eq!(
                    chunks.len(),
                    chunker.chunk_count(len),
                    "size={} overlap={} len={}",
                    size,
                    overlap,
                    len
                );
                if len > size {
                    let expected = (len - overlap).div_ceil(size - overlap);
                    assert_eq!(chunks.len(), expected);
                }
            }
        }
    }

    #[test]
    fn test_reconstruction_is_exact() {
        let text: String = (0..1000)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        for (size, overlap) in [(50, 0), (50, 10), (64, 63), (999, 1)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }

    #[test]
    fn test_neighbouring_chunks_share_overlap() {
        let chunker = Chunker::new(8, 3).unwrap();
        let text = "0123456789abcdefghij";
        let chunks = chunker.split(text);

        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 3).collect();
            let head: String = pair[1].chars().take(3).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_multibyte_text_split_on_char_boundaries() {
        let chunker = Chunker::new(4, 1).unwrap();
        let text = "åäöüéèñçß"; // 9 chars, 18 bytes
        let chunks = chunker.split(text);

        assert_eq!(chunks, vec!["åäöü", "üéèñ", "ñçß"]);
        assert_eq!(reconstruct(&chunks, 1), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }
}
