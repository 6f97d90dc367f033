//! Maximal marginal relevance re-ranking.

use super::store::ChunkSearchResult;
use crate::vector_math::cosine_similarity;

/// Greedily pick up to `k` candidates, trading relevance against redundancy.
///
/// Each step maximizes `lambda * relevance - (1 - lambda) * max_sim`, where
/// `max_sim` is the highest cosine similarity to anything already picked.
/// `lambda = 1` is pure relevance order; `lambda = 0` is pure diversity.
/// The first pick is always the most relevant candidate. Ties go to the
/// earlier candidate. Returns indices into `candidates`.
pub fn select_mmr(candidates: &[ChunkSearchResult], k: usize, lambda: f32) -> Vec<usize> {
    let lambda = lambda.clamp(0.0, 1.0);
    let k = k.min(candidates.len());

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    // running max similarity of each candidate to the selected set
    let mut max_sim = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                candidates[idx].score
            } else {
                lambda * candidates[idx].score - (1.0 - lambda) * max_sim[idx]
            };
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((pos, score)),
            }
        }

        let Some((pos, _)) = best else { break };
        let picked = remaining.remove(pos);
        selected.push(picked);

        for &idx in &remaining {
            let sim = cosine_similarity(&candidates[idx].embedding, &candidates[picked].embedding)
                .unwrap_or(0.0);
            if sim > max_sim[idx] {
                max_sim[idx] = sim;
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::{ChunkMetadata, StoredChunk};

    fn candidate(id: &str, score: f32, embedding: Vec<f32>) -> ChunkSearchResult {
        ChunkSearchResult {
            chunk: StoredChunk {
                chunk_id: id.to_string(),
                content: id.to_string(),
                metadata: ChunkMetadata::default(),
            },
            score,
            embedding,
        }
    }

    fn pool() -> Vec<ChunkSearchResult> {
        vec![
            candidate("a", 0.95, vec![1.0, 0.0, 0.0]),
            candidate("a-dup", 0.94, vec![1.0, 0.01, 0.0]),
            candidate("b", 0.80, vec![0.0, 1.0, 0.0]),
            candidate("c", 0.60, vec![0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn first_pick_is_most_relevant() {
        assert_eq!(select_mmr(&pool(), 1, 0.5)[0], 0);
        assert_eq!(select_mmr(&pool(), 1, 0.0)[0], 0);
    }

    #[test]
    fn near_duplicates_are_pushed_down() {
        let picked = select_mmr(&pool(), 3, 0.5);
        assert_eq!(picked, vec![0, 2, 3]);
    }

    #[test]
    fn lambda_one_is_plain_relevance_order() {
        assert_eq!(select_mmr(&pool(), 4, 1.0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn k_larger_than_pool_returns_everything_once() {
        let picked = select_mmr(&pool(), 10, 0.5);
        assert_eq!(picked.len(), 4);
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_pool_selects_nothing() {
        assert!(select_mmr(&[], 4, 0.5).is_empty());
    }
}
