//! SQLite-backed vector index.
//!
//! Each operation opens its own connection against a WAL-mode database, so
//! searches proceed while another document is being ingested. A document
//! upsert is one transaction (delete prior entries, insert new ones), which
//! gives idempotent overwrite and keeps partially ingested documents
//! invisible to concurrent searches.

use crate::index::VectorIndex;
use crate::types::{Document, IndexStats, Passage, ScoredPassage, SearchFilter};
use pdfchat_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SQLite vector index over a database file.
pub struct SqliteVectorIndex {
    db_path: PathBuf,
}

impl SqliteVectorIndex {
    /// Open (creating if needed) the index at the given path.
    pub fn new(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::IndexUnavailable(format!("Failed to create index directory: {}", e))
            })?;
        }

        let index = Self {
            db_path: db_path.to_path_buf(),
        };

        // Create schema up front so later opens are read-mostly
        let conn = index.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                ingested_at TEXT NOT NULL,
                byte_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                text TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            );

            CREATE INDEX IF NOT EXISTS idx_passages_document ON passages(document_id);
            "#,
        )
        .map_err(|e| AppError::IndexUnavailable(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Initialized SQLite index at {:?}", index.db_path);
        Ok(index)
    }

    /// Open a connection with WAL journaling and a busy timeout.
    fn open(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to open index: {}", e)))?;

        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to set busy timeout: {}", e)))?;

        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to enable WAL: {}", e)))?;

        Ok(conn)
    }

    /// Read the declared dimensionality, if any entries were ever stored.
    fn dimension(conn: &Connection) -> AppResult<Option<usize>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'dimension'",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to read dimension: {}", e)))?;

        match value {
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|e| AppError::IndexUnavailable(format!("Corrupt dimension value: {}", e))),
            None => Ok(None),
        }
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn upsert_document(&self, document: &Document, passages: &[Passage]) -> AppResult<()> {
        if passages.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot upsert a document with no passages".to_string(),
            ));
        }

        // Validate embeddings before touching the database
        let dim = passages[0]
            .embedding
            .as_ref()
            .ok_or_else(|| {
                AppError::InvalidInput(format!("passage '{}' has no embedding", passages[0].id))
            })?
            .len();

        for passage in passages {
            let embedding = passage.embedding.as_ref().ok_or_else(|| {
                AppError::InvalidInput(format!("passage '{}' has no embedding", passage.id))
            })?;
            if embedding.len() != dim {
                return Err(AppError::InvalidInput(format!(
                    "passage '{}' has dimensionality {} but the batch declares {}",
                    passage.id,
                    embedding.len(),
                    dim
                )));
            }
            if passage.document_id != document.id {
                return Err(AppError::InvalidInput(format!(
                    "passage '{}' does not belong to document '{}'",
                    passage.id, document.id
                )));
            }
        }

        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to begin upsert: {}", e)))?;

        // Enforce the index-wide dimensionality invariant
        match Self::dimension(&tx)? {
            Some(declared) if declared != dim => {
                return Err(AppError::InvalidInput(format!(
                    "index dimensionality is {}, cannot upsert {}-dimensional vectors",
                    declared, dim
                )));
            }
            Some(_) => {}
            None => {
                tx.execute(
                    "INSERT OR REPLACE INTO meta (key, value) VALUES ('dimension', ?1)",
                    params![dim.to_string()],
                )
                .map_err(|e| {
                    AppError::IndexUnavailable(format!("Failed to record dimension: {}", e))
                })?;
            }
        }

        // Replace prior entries for this document id
        tx.execute(
            "DELETE FROM passages WHERE document_id = ?1",
            params![document.id],
        )
        .map_err(|e| AppError::IndexUnavailable(format!("Failed to clear prior entries: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO documents (id, filename, ingested_at, byte_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                document.id,
                document.filename,
                document.ingested_at.to_rfc3339(),
                document.text.len() as i64,
            ],
        )
        .map_err(|e| AppError::IndexUnavailable(format!("Failed to insert document: {}", e)))?;

        for passage in passages {
            let embedding_bytes = embedding_to_bytes(
                passage
                    .embedding
                    .as_ref()
                    .ok_or_else(|| {
                        AppError::InvalidInput(format!("passage '{}' has no embedding", passage.id))
                    })?,
            );

            tx.execute(
                "INSERT INTO passages (id, document_id, seq, text, start_offset, end_offset, hash, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    passage.id,
                    passage.document_id,
                    passage.seq as i64,
                    passage.text,
                    passage.start as i64,
                    passage.end as i64,
                    passage.hash,
                    embedding_bytes,
                ],
            )
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to insert passage: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to commit upsert: {}", e)))?;

        tracing::debug!(
            "Upserted document '{}' ({} passages)",
            document.id,
            passages.len()
        );

        Ok(())
    }

    fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> AppResult<Vec<ScoredPassage>> {
        let conn = self.open()?;

        match Self::dimension(&conn)? {
            Some(declared) if declared != query_vector.len() => {
                return Err(AppError::InvalidInput(format!(
                    "query dimensionality {} does not match index dimensionality {}",
                    query_vector.len(),
                    declared
                )));
            }
            Some(_) => {}
            None => return Ok(Vec::new()), // nothing ingested yet
        }

        let document_filter = filter.and_then(|f| f.document_id.clone());

        let sql = if document_filter.is_some() {
            "SELECT p.id, p.document_id, p.seq, p.text, p.start_offset, p.end_offset, p.hash,
                    p.embedding, d.filename
             FROM passages p JOIN documents d ON d.id = p.document_id
             WHERE p.document_id = ?1"
        } else {
            "SELECT p.id, p.document_id, p.seq, p.text, p.start_offset, p.end_offset, p.hash,
                    p.embedding, d.filename
             FROM passages p JOIN documents d ON d.id = p.document_id"
        };

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to prepare search: {}", e)))?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(Passage, String)> {
            let embedding_bytes: Vec<u8> = row.get(7)?;
            let embedding = bytes_to_embedding(&embedding_bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            Ok((
                Passage {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    seq: row.get::<_, i64>(2)? as u32,
                    text: row.get(3)?,
                    start: row.get::<_, i64>(4)? as usize,
                    end: row.get::<_, i64>(5)? as usize,
                    hash: row.get(6)?,
                    embedding: Some(embedding),
                },
                row.get(8)?,
            ))
        };

        let rows: Vec<(Passage, String)> = if let Some(ref doc_id) = document_filter {
            stmt.query_map(params![doc_id], map_row)
                .map_err(|e| AppError::IndexUnavailable(format!("Search failed: {}", e)))?
                .collect::<rusqlite::Result<_>>()
                .map_err(|e| AppError::IndexUnavailable(format!("Search failed: {}", e)))?
        } else {
            stmt.query_map([], map_row)
                .map_err(|e| AppError::IndexUnavailable(format!("Search failed: {}", e)))?
                .collect::<rusqlite::Result<_>>()
                .map_err(|e| AppError::IndexUnavailable(format!("Search failed: {}", e)))?
        };

        let mut results: Vec<ScoredPassage> = rows
            .into_iter()
            .map(|(passage, filename)| {
                let score = match passage.embedding.as_ref() {
                    Some(v) => cosine_similarity(query_vector, v),
                    None => 0.0,
                };
                ScoredPassage {
                    passage,
                    filename,
                    score,
                }
            })
            .collect();

        // Descending score; equal scores break ties on passage id so
        // results are deterministic
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.passage.id.cmp(&b.passage.id))
        });

        results.truncate(top_k);

        tracing::debug!("Retrieved {} passages (requested top-{})", results.len(), top_k);

        Ok(results)
    }

    fn delete_document(&self, document_id: &str) -> AppResult<()> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to begin delete: {}", e)))?;

        tx.execute(
            "DELETE FROM passages WHERE document_id = ?1",
            params![document_id],
        )
        .map_err(|e| AppError::IndexUnavailable(format!("Failed to delete passages: {}", e)))?;

        tx.execute("DELETE FROM documents WHERE id = ?1", params![document_id])
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to delete document: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to commit delete: {}", e)))?;

        tracing::info!("Deleted document '{}' from index", document_id);
        Ok(())
    }

    fn stats(&self) -> AppResult<IndexStats> {
        let conn = self.open()?;

        let documents: u32 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| {
                row.get::<_, i64>(0).map(|v| v as u32)
            })
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to count documents: {}", e)))?;

        let passages: u32 = conn
            .query_row("SELECT COUNT(*) FROM passages", [], |row| {
                row.get::<_, i64>(0).map(|v| v as u32)
            })
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to count passages: {}", e)))?;

        let dimension = Self::dimension(&conn)?;

        let db_size_bytes = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(IndexStats {
            documents,
            passages,
            dimension,
            db_size_bytes,
        })
    }
}

/// Convert an embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::IndexUnavailable(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    let mut embedding = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        embedding.push(value);
    }

    Ok(embedding)
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_index(dir: &TempDir) -> SqliteVectorIndex {
        SqliteVectorIndex::new(&dir.path().join("index.db")).unwrap()
    }

    fn doc(filename: &str, text: &str) -> Document {
        Document::new(filename, text)
    }

    fn passage(document: &Document, seq: u32, text: &str, vector: Vec<f32>) -> Passage {
        let start = seq as usize * 10;
        let mut p = Passage::new(&document.id, seq, text.to_string(), start, start + text.len());
        p.embedding = Some(vector);
        p
    }

    #[test]
    fn test_upsert_and_search() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let d = doc("manual.pdf", "full text");
        let passages = vec![
            passage(&d, 0, "red apples", vec![1.0, 0.0, 0.0]),
            passage(&d, 1, "green pears", vec![0.0, 1.0, 0.0]),
        ];

        index.upsert_document(&d, &passages).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.text, "red apples");
        assert_eq!(results[0].filename, "manual.pdf");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_ordering_and_tie_break() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let d = doc("a.pdf", "text");
        // Two identical vectors tie; order must fall back to passage id
        let passages = vec![
            passage(&d, 1, "second", vec![1.0, 0.0]),
            passage(&d, 0, "first", vec![1.0, 0.0]),
            passage(&d, 2, "third", vec![0.5, 0.5]),
        ];
        index.upsert_document(&d, &passages).unwrap();

        let results = index.search(&[1.0, 0.0], 5, None).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].passage.seq, 0);
        assert_eq!(results[1].passage.seq, 1);
        assert_eq!(results[2].passage.seq, 2);

        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let d = doc("a.pdf", "text");
        let passages = vec![
            passage(&d, 0, "alpha", vec![1.0, 0.0]),
            passage(&d, 1, "beta", vec![0.0, 1.0]),
        ];

        index.upsert_document(&d, &passages).unwrap();
        index.upsert_document(&d, &passages).unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.passages, 2);
    }

    #[test]
    fn test_reingest_replaces_prior_entries() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let d = doc("a.pdf", "text");
        index
            .upsert_document(
                &d,
                &[
                    passage(&d, 0, "old passage", vec![1.0, 0.0]),
                    passage(&d, 1, "stale passage", vec![0.0, 1.0]),
                ],
            )
            .unwrap();

        index
            .upsert_document(&d, &[passage(&d, 0, "new passage", vec![1.0, 0.0])])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 10, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.text, "new passage");
    }

    #[test]
    fn test_delete_document() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let a = doc("a.pdf", "text a");
        let b = doc("b.pdf", "text b");
        index
            .upsert_document(&a, &[passage(&a, 0, "from a", vec![1.0, 0.0])])
            .unwrap();
        index
            .upsert_document(&b, &[passage(&b, 0, "from b", vec![0.9, 0.1])])
            .unwrap();

        index.delete_document(&a.id).unwrap();

        let results = index.search(&[1.0, 0.0], 10, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.document_id, b.id);

        let stats = index.stats().unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.passages, 1);
    }

    #[test]
    fn test_document_filter() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let a = doc("a.pdf", "text a");
        let b = doc("b.pdf", "text b");
        index
            .upsert_document(&a, &[passage(&a, 0, "from a", vec![1.0, 0.0])])
            .unwrap();
        index
            .upsert_document(&b, &[passage(&b, 0, "from b", vec![1.0, 0.0])])
            .unwrap();

        let filter = SearchFilter {
            document_id: Some(a.id.clone()),
        };
        let results = index.search(&[1.0, 0.0], 10, Some(&filter)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.document_id, a.id);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let a = doc("a.pdf", "text a");
        index
            .upsert_document(&a, &[passage(&a, 0, "two dims", vec![1.0, 0.0])])
            .unwrap();

        // Upsert with a different dimensionality violates the invariant
        let b = doc("b.pdf", "text b");
        let err = index
            .upsert_document(&b, &[passage(&b, 0, "three dims", vec![1.0, 0.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // So does a mismatched query vector
        let err = index.search(&[1.0, 0.0, 0.0], 5, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_unembedded_passage_rejected_without_partial_state() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let d = doc("a.pdf", "text");
        let mut bad = passage(&d, 1, "no vector", vec![]);
        bad.embedding = None;
        let batch = vec![passage(&d, 0, "good", vec![1.0, 0.0]), bad];

        assert!(index.upsert_document(&d, &batch).is_err());

        // Nothing from the failed upsert is visible
        let stats = index.stats().unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.passages, 0);
    }

    #[test]
    fn test_search_empty_index() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let results = index.search(&[1.0, 0.0], 5, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_fewer_results_than_top_k() {
        let dir = TempDir::new().unwrap();
        let index = make_index(&dir);

        let d = doc("a.pdf", "text");
        index
            .upsert_document(&d, &[passage(&d, 0, "only one", vec![1.0, 0.0])])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 10, None).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_embedding_byte_roundtrip() {
        let original = vec![0.25f32, -1.5, 3.75, 0.0];
        let bytes = embedding_to_bytes(&original);
        let restored = bytes_to_embedding(&bytes).unwrap();
        assert_eq!(original, restored);

        assert!(bytes_to_embedding(&[1, 2, 3]).is_err());
    }
}
