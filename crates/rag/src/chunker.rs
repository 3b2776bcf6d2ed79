//! Document chunking with configurable size and overlap.
//!
//! Splitting is sentence/paragraph-aware via the text-splitter crate, so
//! passages break at semantic boundaries rather than hard character cuts.
//! Byte offsets into the original document are preserved on every passage;
//! the retriever's overlap dedup and the answer source references depend
//! on them.

use crate::types::Passage;
use pdfchat_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Chunk document text into overlapping passages.
///
/// `chunk_size` and `overlap` are in characters; `overlap` must be smaller
/// than `chunk_size`. Deterministic: the same input and parameters always
/// yield the same passage sequence. Produces no empty passages.
///
/// # Errors
/// `InvalidInput` for empty text or inconsistent parameters.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Passage>> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "document text is empty".to_string(),
        ));
    }
    if chunk_size == 0 {
        return Err(AppError::InvalidInput("chunk_size must be > 0".to_string()));
    }
    if overlap >= chunk_size {
        return Err(AppError::InvalidInput(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::InvalidInput(format!("invalid chunk parameters: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let mut passages = Vec::new();
    let mut seq = 0u32;

    for (offset, span) in splitter.chunk_indices(text) {
        if span.trim().is_empty() {
            continue;
        }

        passages.push(Passage::new(
            document_id,
            seq,
            span.to_string(),
            offset,
            offset + span.len(),
        ));
        seq += 1;
    }

    if passages.is_empty() {
        return Err(AppError::InvalidInput(
            "document text produced no passages".to_string(),
        ));
    }

    tracing::debug!(
        "Chunked document '{}' into {} passages (size: {}, overlap: {})",
        document_id,
        passages.len(),
        chunk_size,
        overlap
    );

    Ok(passages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> String {
        "The quick brown fox jumps over the lazy dog. \
         Pack my box with five dozen liquor jugs. \
         How vexingly quick daft zebras jump. \
         Sphinx of black quartz, judge my vow. "
            .repeat(12)
    }

    #[test]
    fn test_chunk_empty_text_is_invalid_input() {
        let err = chunk_document("doc", "", 100, 10).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = chunk_document("doc", "   \n\t ", 100, 10).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_chunk_invalid_params() {
        assert!(chunk_document("doc", "some text", 0, 0).is_err());
        assert!(chunk_document("doc", "some text", 100, 100).is_err());
        assert!(chunk_document("doc", "some text", 100, 200).is_err());
    }

    #[test]
    fn test_chunk_deterministic() {
        let text = sample_text();
        let a = chunk_document("doc", &text, 200, 50).unwrap();
        let b = chunk_document("doc", &text, 200, 50).unwrap();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.text, y.text);
            assert_eq!((x.start, x.end), (y.start, y.end));
        }
    }

    #[test]
    fn test_chunk_no_empty_passages_and_sequential_ids() {
        let text = sample_text();
        let passages = chunk_document("doc", &text, 200, 50).unwrap();

        assert!(passages.len() > 1);
        for (i, passage) in passages.iter().enumerate() {
            assert!(!passage.text.trim().is_empty());
            assert_eq!(passage.seq, i as u32);
            assert_eq!(passage.document_id, "doc");
            assert_eq!(passage.id, Passage::id_for("doc", i as u32));
        }
    }

    #[test]
    fn test_chunk_offsets_match_source() {
        let text = sample_text();
        let passages = chunk_document("doc", &text, 200, 50).unwrap();

        for passage in &passages {
            assert_eq!(&text[passage.start..passage.end], passage.text);
        }
    }

    #[test]
    fn test_chunk_lossless_modulo_overlap() {
        // Concatenating the non-overlapping remainders reconstructs the
        // original text, ignoring whitespace normalization at boundaries.
        let text = sample_text();
        let passages = chunk_document("doc", &text, 200, 50).unwrap();

        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for passage in &passages {
            let start = passage.start.max(covered);
            if start < passage.end {
                rebuilt.push_str(&text[start..passage.end]);
                covered = passage.end;
            }
        }

        let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(strip(&rebuilt), strip(&text));
    }

    #[test]
    fn test_chunk_overlap_preserves_trailing_context() {
        let text = sample_text();
        let with_overlap = chunk_document("doc", &text, 200, 50).unwrap();

        // Consecutive passages share a region when overlap is configured
        let mut saw_overlap = false;
        for pair in with_overlap.windows(2) {
            if pair[1].start < pair[0].end {
                saw_overlap = true;
                break;
            }
        }
        assert!(saw_overlap, "expected overlapping consecutive passages");
    }

    #[test]
    fn test_chunk_utf8_text() {
        let text = "Olá mundo, això és un test. Ça marche très bien. ".repeat(20);
        let passages = chunk_document("doc", &text, 120, 20).unwrap();

        assert!(!passages.is_empty());
        for passage in &passages {
            assert_eq!(&text[passage.start..passage.end], passage.text);
        }
    }
}
