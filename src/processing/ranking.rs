//! Candidate scoring, ranking, and result assembly helpers for search.

use super::similarity::cosine_similarity;
use super::types::{ScoredChunk, SearchError};
use crate::store::Document;
use std::collections::HashSet;

/// Number of chunks returned per query.
pub const TOP_K: usize = 5;
/// Number of top chunks fed to the summarizer.
pub const SUMMARY_SOURCE_COUNT: usize = 3;
/// Maximum number of related documents returned per query.
pub const RELATED_DOCS_LIMIT: usize = 5;

/// Score every chunk of every document against the query, in encounter order.
pub(crate) fn score_candidates(
    query: &[f32],
    documents: &[Document],
) -> Result<Vec<ScoredChunk>, SearchError> {
    let mut candidates = Vec::with_capacity(documents.iter().map(|doc| doc.chunks.len()).sum());
    for document in documents {
        for chunk in &document.chunks {
            let similarity = cosine_similarity(query, &chunk.embedding).map_err(|source| {
                SearchError::Scoring {
                    document_id: document.id.clone(),
                    source,
                }
            })?;
            candidates.push(ScoredChunk {
                text: chunk.text.clone(),
                similarity,
                document_id: document.id.clone(),
                title: document.title.clone(),
            });
        }
    }
    Ok(candidates)
}

/// Order candidates best first and keep the top `k`.
///
/// The sort is stable, so exact ties keep their encounter order.
pub(crate) fn select_top(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
    candidates.truncate(k);
    candidates
}

/// Join the texts of the best `SUMMARY_SOURCE_COUNT` results with blank lines.
pub(crate) fn summary_input(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .take(SUMMARY_SOURCE_COUNT)
        .map(|result| result.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Distinct document ids referenced by `results`, in first-seen order.
pub(crate) fn related_document_ids(results: &[ScoredChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter(|result| seen.insert(result.document_id.as_str()))
        .map(|result| result.document_id.clone())
        .take(RELATED_DOCS_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::similarity::SimilarityError;
    use crate::store::Chunk;

    fn document(id: &str, chunks: &[(&str, &[f32])]) -> Document {
        Document {
            id: id.into(),
            title: format!("{id}.pdf"),
            file_url: format!("/uploads/{id}.pdf"),
            department: "CS".into(),
            uploaded_by: "user-1".into(),
            chunks: chunks
                .iter()
                .map(|(text, embedding)| Chunk {
                    text: (*text).into(),
                    embedding: embedding.to_vec(),
                })
                .collect(),
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    fn scored(text: &str, similarity: f32, document_id: &str) -> ScoredChunk {
        ScoredChunk {
            text: text.into(),
            similarity,
            document_id: document_id.into(),
            title: format!("{document_id}.pdf"),
        }
    }

    #[test]
    fn ranks_axis_aligned_scenario() {
        let documents = vec![
            document("x", &[("exact", &[1.0, 0.0])]),
            document("y", &[("orthogonal", &[0.0, 1.0])]),
            document("z", &[("diagonal", &[0.7, 0.7])]),
        ];
        let candidates = score_candidates(&[1.0, 0.0], &documents).unwrap();
        let top = select_top(candidates, TOP_K);

        let texts: Vec<_> = top.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "diagonal", "orthogonal"]);
        assert!((top[0].similarity - 1.0).abs() < 1e-6);
        assert!((top[1].similarity - 0.707_106_8).abs() < 1e-4);
        assert!(top[2].similarity.abs() < 1e-6);
        assert_eq!(top[1].document_id, "z");
        assert_eq!(top[1].title, "z.pdf");
    }

    #[test]
    fn select_top_is_stable_for_ties_and_bounded() {
        let candidates = vec![
            scored("a", 0.5, "d1"),
            scored("b", 0.9, "d1"),
            scored("c", 0.5, "d2"),
            scored("d", 0.5, "d3"),
            scored("e", 0.1, "d3"),
            scored("f", 0.5, "d4"),
            scored("g", 0.5, "d5"),
        ];
        let top = select_top(candidates, TOP_K);
        let texts: Vec<_> = top.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a", "c", "d", "f"]);
        assert!(top.windows(2).all(|pair| pair[0].similarity >= pair[1].similarity));
    }

    #[test]
    fn scoring_reports_offending_document() {
        let documents = vec![
            document("ok", &[("fine", &[1.0, 0.0])]),
            document("bad", &[("broken", &[1.0, 0.0, 0.0])]),
        ];
        let error = score_candidates(&[1.0, 0.0], &documents).unwrap_err();
        assert!(matches!(
            error,
            SearchError::Scoring {
                ref document_id,
                source: SimilarityError::DimensionMismatch { left: 2, right: 3 },
            } if document_id == "bad"
        ));
    }

    #[test]
    fn summary_input_uses_top_three() {
        let results = vec![
            scored("one", 0.9, "d1"),
            scored("two", 0.8, "d1"),
            scored("three", 0.7, "d2"),
            scored("four", 0.6, "d2"),
        ];
        assert_eq!(summary_input(&results), "one\n\ntwo\n\nthree");
        assert_eq!(summary_input(&[]), "");
    }

    #[test]
    fn related_ids_dedupe_in_first_seen_order() {
        let results = vec![
            scored("a", 0.9, "d2"),
            scored("b", 0.8, "d1"),
            scored("c", 0.7, "d2"),
            scored("d", 0.6, "d3"),
        ];
        assert_eq!(related_document_ids(&results), vec!["d2", "d1", "d3"]);
    }
}
