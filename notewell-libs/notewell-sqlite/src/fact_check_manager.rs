use crate::schemas::fact_check::{FactCheckChunk, FactCheckItem, FactCheckMatch};
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};

const RRF_K: f32 = 60.0;

fn item_from_row(row: &Row) -> Result<FactCheckItem, rusqlite::Error> {
    let tags_json: String = row.get(6)?;
    let dataset_tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(FactCheckItem {
        id: row.get(0)?,
        dataset_name: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        rating: row.get(4)?,
        source_url: row.get(5)?,
        dataset_tags,
        created_at: row.get(7)?,
    })
}

/// Lowercased word set used for the lexical half of the hybrid search.
fn lexical_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

struct ChunkCandidate {
    chunk_id: String,
    item_id: String,
    chunk_text: String,
    dense_score: f32,
    lexical_score: f32,
}

impl SqliteManager {
    pub fn add_fact_check_item(&self, item: &FactCheckItem) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO fact_check_items (id, dataset_name, title, content, rating, source_url, dataset_tags, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.id,
                item.dataset_name,
                item.title,
                item.content,
                item.rating,
                item.source_url,
                serde_json::to_string(&item.dataset_tags)?,
                item.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_fact_check_item(&self, item_id: &str) -> Result<Option<FactCheckItem>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, dataset_name, title, content, rating, source_url, dataset_tags, created_at \
             FROM fact_check_items WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![item_id], item_from_row).optional()?)
    }

    pub fn get_all_fact_check_item_ids(&self) -> Result<Vec<String>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT id FROM fact_check_items ORDER BY created_at, id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SqliteManagerError::DatabaseError)
    }

    /// Replaces the chunk set of an item inside one transaction. Used both by
    /// the importer and by the rechunk workflows.
    pub fn replace_fact_check_chunks(
        &self,
        item_id: &str,
        chunks: &[FactCheckChunk],
    ) -> Result<(), SqliteManagerError> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM fact_check_chunks WHERE item_id = ?1", params![item_id])?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO fact_check_chunks \
                 (id, item_id, chunk_index, text, start_offset, end_offset, embedding, provider, model) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    chunk.id,
                    chunk.item_id,
                    chunk.chunk_index,
                    chunk.text,
                    chunk.start_offset,
                    chunk.end_offset,
                    Self::embedding_to_blob(&chunk.embedding),
                    chunk.provider,
                    chunk.model,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn chunk_count_for_item(&self, item_id: &str) -> Result<i64, SqliteManagerError> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fact_check_chunks WHERE item_id = ?1",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Hybrid similarity search over fact-check chunks.
    ///
    /// Dense cosine scores and lexical overlap scores are combined with a
    /// normalized reciprocal-rank fusion (a chunk ranked first on both lists
    /// scores 1.0). Chunks below `similarity_threshold` on the dense score are
    /// discarded before fusion; fused results below `score_threshold` are
    /// dropped. At most one match per item is returned, ordered by fused score
    /// descending with chunk id as the deterministic tie-break.
    pub fn similarity_search(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        dataset_tags: &[String],
        similarity_threshold: f32,
        score_threshold: f32,
        limit: usize,
    ) -> Result<Vec<FactCheckMatch>, SqliteManagerError> {
        let conn = self.get_connection()?;

        let mut items: HashMap<String, FactCheckItem> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT id, dataset_name, title, content, rating, source_url, dataset_tags, created_at \
                 FROM fact_check_items",
            )?;
            let rows = stmt.query_map([], item_from_row)?;
            for row in rows {
                let item = row?;
                if dataset_tags.is_empty() || item.dataset_tags.iter().any(|t| dataset_tags.contains(t)) {
                    items.insert(item.id.clone(), item);
                }
            }
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let query_tokens = lexical_tokens(query_text);
        let mut candidates: Vec<ChunkCandidate> = Vec::new();
        {
            let mut stmt =
                conn.prepare("SELECT id, item_id, text, embedding FROM fact_check_chunks ORDER BY id")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let item_id: String = row.get(1)?;
                if !items.contains_key(&item_id) {
                    continue;
                }
                let chunk_id: String = row.get(0)?;
                let chunk_text: String = row.get(2)?;
                let blob: Vec<u8> = row.get(3)?;
                let embedding = Self::blob_to_embedding(&blob)?;

                let dense_score = Self::cosine_similarity(query_embedding, &embedding);
                if dense_score < similarity_threshold {
                    continue;
                }

                let chunk_tokens = lexical_tokens(&chunk_text);
                let overlap = query_tokens.intersection(&chunk_tokens).count() as f32;
                let union = query_tokens.union(&chunk_tokens).count() as f32;
                let lexical_score = if union > 0.0 { overlap / union } else { 0.0 };

                candidates.push(ChunkCandidate {
                    chunk_id,
                    item_id,
                    chunk_text,
                    dense_score,
                    lexical_score,
                });
            }
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Rank positions on each list feed the fusion; ties resolve by chunk id
        // so identical inputs always produce identical output.
        let mut dense_order: Vec<usize> = (0..candidates.len()).collect();
        dense_order.sort_by(|&a, &b| {
            candidates[b]
                .dense_score
                .partial_cmp(&candidates[a].dense_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| candidates[a].chunk_id.cmp(&candidates[b].chunk_id))
        });
        let mut lexical_order: Vec<usize> = (0..candidates.len()).collect();
        lexical_order.sort_by(|&a, &b| {
            candidates[b]
                .lexical_score
                .partial_cmp(&candidates[a].lexical_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| candidates[a].chunk_id.cmp(&candidates[b].chunk_id))
        });

        let mut dense_rank: HashMap<usize, usize> = HashMap::new();
        for (rank, idx) in dense_order.iter().enumerate() {
            dense_rank.insert(*idx, rank + 1);
        }
        let mut lexical_rank: HashMap<usize, usize> = HashMap::new();
        for (rank, idx) in lexical_order.iter().enumerate() {
            lexical_rank.insert(*idx, rank + 1);
        }

        let mut scored: Vec<(f32, usize)> = candidates
            .iter()
            .enumerate()
            .map(|(idx, _)| {
                let d = dense_rank[&idx] as f32;
                let l = lexical_rank[&idx] as f32;
                let fused = (1.0 / (RRF_K + d) + 1.0 / (RRF_K + l)) * (RRF_K + 1.0) / 2.0;
                (fused, idx)
            })
            .filter(|(fused, _)| *fused >= score_threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| candidates[a.1].chunk_id.cmp(&candidates[b.1].chunk_id))
        });

        let mut seen_items: HashSet<String> = HashSet::new();
        let mut matches = Vec::new();
        for (fused, idx) in scored {
            let candidate = &candidates[idx];
            if !seen_items.insert(candidate.item_id.clone()) {
                continue;
            }
            let item = &items[&candidate.item_id];
            matches.push(FactCheckMatch {
                item_id: item.id.clone(),
                dataset_name: item.dataset_name.clone(),
                dataset_tags: item.dataset_tags.clone(),
                title: item.title.clone(),
                content: item.content.clone(),
                source_url: item.source_url.clone(),
                chunk_id: candidate.chunk_id.clone(),
                chunk_text: candidate.chunk_text.clone(),
                similarity_score: candidate.dense_score,
                fused_score: fused,
            });
            if matches.len() >= limit {
                break;
            }
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_db() -> (TempDir, SqliteManager) {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("facts.db")).unwrap();
        (dir, db)
    }

    fn add_item_with_chunk(db: &SqliteManager, title: &str, text: &str, tags: &[&str], embedding: Vec<f32>) -> String {
        let item = FactCheckItem {
            id: Uuid::new_v4().to_string(),
            dataset_name: "snopes".to_string(),
            title: title.to_string(),
            content: text.to_string(),
            rating: Some("false".to_string()),
            source_url: Some("https://snopes.com/test".to_string()),
            dataset_tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: SqliteManager::now_rfc3339(),
        };
        db.add_fact_check_item(&item).unwrap();
        let chunk = FactCheckChunk {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            chunk_index: 0,
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.len() as i64,
            embedding,
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
        };
        db.replace_fact_check_chunks(&item.id, &[chunk]).unwrap();
        item.id
    }

    #[test]
    fn test_similarity_search_orders_by_fused_score() {
        let (_dir, db) = test_db();
        let close = add_item_with_chunk(
            &db,
            "Biden confederate claim",
            "Claim that Biden served as a confederate soldier is false",
            &["snopes"],
            vec![1.0, 0.0, 0.0],
        );
        let far = add_item_with_chunk(
            &db,
            "Moon cheese",
            "Claim that the moon is made of cheese is false",
            &["snopes"],
            vec![0.0, 1.0, 0.0],
        );

        let matches = db
            .similarity_search(
                &[0.9, 0.1, 0.0],
                "biden was a confederate soldier",
                &["snopes".to_string()],
                0.1,
                0.0,
                5,
            )
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].item_id, close);
        assert_eq!(matches[1].item_id, far);
        assert!(matches[0].fused_score > matches[1].fused_score);
        assert!(matches[0].similarity_score > 0.9);
    }

    #[test]
    fn test_similarity_search_respects_dense_threshold() {
        let (_dir, db) = test_db();
        add_item_with_chunk(&db, "A", "some unrelated content entirely", &["snopes"], vec![0.0, 1.0, 0.0]);

        let matches = db
            .similarity_search(&[1.0, 0.0, 0.0], "query text", &["snopes".to_string()], 0.5, 0.0, 5)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_similarity_search_filters_by_dataset_tags() {
        let (_dir, db) = test_db();
        add_item_with_chunk(&db, "A", "tagged content here", &["politifact"], vec![1.0, 0.0, 0.0]);

        let matches = db
            .similarity_search(&[1.0, 0.0, 0.0], "tagged content", &["snopes".to_string()], 0.1, 0.0, 5)
            .unwrap();
        assert!(matches.is_empty());

        let matches = db
            .similarity_search(&[1.0, 0.0, 0.0], "tagged content", &["politifact".to_string()], 0.1, 0.0, 5)
            .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_similarity_search_is_deterministic() {
        let (_dir, db) = test_db();
        for i in 0..5 {
            add_item_with_chunk(
                &db,
                &format!("Item {}", i),
                "identical chunk text for every item",
                &["snopes"],
                vec![1.0, 0.0, 0.0],
            );
        }

        let run = || {
            db.similarity_search(
                &[1.0, 0.0, 0.0],
                "identical chunk text",
                &["snopes".to_string()],
                0.1,
                0.0,
                3,
            )
            .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_replace_chunks_is_idempotent() {
        let (_dir, db) = test_db();
        let item_id = add_item_with_chunk(&db, "A", "chunked text", &["snopes"], vec![1.0, 0.0]);
        assert_eq!(db.chunk_count_for_item(&item_id).unwrap(), 1);

        let chunks: Vec<FactCheckChunk> = (0..3)
            .map(|i| FactCheckChunk {
                id: Uuid::new_v4().to_string(),
                item_id: item_id.clone(),
                chunk_index: i,
                text: format!("part {}", i),
                start_offset: 0,
                end_offset: 6,
                embedding: vec![0.5, 0.5],
                provider: "openai".to_string(),
                model: "text-embedding-3-small".to_string(),
            })
            .collect();
        db.replace_fact_check_chunks(&item_id, &chunks).unwrap();
        assert_eq!(db.chunk_count_for_item(&item_id).unwrap(), 3);
    }
}
