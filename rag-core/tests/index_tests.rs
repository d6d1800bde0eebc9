//! Property tests for vector index search ordering and cosine similarity.

mod common;

use std::sync::Arc;

use common::MockEmbeddingProvider;
use proptest::prelude::*;
use rag_core::document::Chunk;
use rag_core::{EmbeddingClient, RagError, VectorIndex, cosine_similarity};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-4 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn chunk(i: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("doc@{i}"),
        document_id: "doc".to_string(),
        index: i,
        text: text.to_string(),
        start: i,
        end: i + text.chars().count(),
    }
}

/// **Search ordering**
/// *For any* populated index, search returns exactly `min(k, n)` results in
/// non-increasing score order, and equal scores appear in insertion order.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_sorted_stable_and_sized(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 0..20),
            duplicates in 0usize..4,
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let mut index = VectorIndex::new();
            for (i, embedding) in embeddings.iter().enumerate() {
                index.insert(chunk(i, "text"), embedding.clone()).unwrap();
            }
            // Identical vectors appended at the end force exact ties.
            if let Some(first) = embeddings.first() {
                for d in 0..duplicates {
                    index.insert(chunk(embeddings.len() + d, "dup"), first.clone()).unwrap();
                }
            }

            let results = index.search(&query, k).unwrap();
            prop_assert_eq!(results.len(), k.min(index.len()));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
                if window[0].score == window[1].score {
                    prop_assert!(window[0].rank < window[1].rank);
                }
            }
        }

        #[test]
        fn cosine_is_symmetric_and_self_similar(
            a in arb_normalized_embedding(DIM),
            b in arb_normalized_embedding(DIM),
            scale in 0.1f32..10.0,
        ) {
            prop_assert_eq!(cosine_similarity(&a, &b).unwrap(), cosine_similarity(&b, &a).unwrap());
            let scaled: Vec<f32> = a.iter().map(|x| x * scale).collect();
            let self_sim = cosine_similarity(&scaled, &scaled).unwrap();
            prop_assert!((self_sim - 1.0).abs() < 1e-5, "self similarity was {}", self_sim);
        }
    }
}

#[test]
fn orthogonal_embeddings_rank_nearest_first() {
    let mut index = VectorIndex::new();
    index.insert(chunk(0, "east"), vec![1.0, 0.0]).unwrap();
    index.insert(chunk(1, "north"), vec![0.0, 1.0]).unwrap();
    index.insert(chunk(2, "north-east"), vec![0.7, 0.7]).unwrap();

    let results = index.search(&[1.0, 0.0], 2).unwrap();
    let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["east", "north-east"]);
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert!((results[1].score - 0.7071).abs() < 1e-3);
}

#[test]
fn k_larger_than_index_returns_everything() {
    let mut index = VectorIndex::new();
    for i in 0..3 {
        index.insert(chunk(i, "t"), vec![1.0, i as f32]).unwrap();
    }
    assert_eq!(index.search(&[1.0, 1.0], 10).unwrap().len(), 3);
}

#[test]
fn dimension_mismatch_is_reported() {
    let err = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 4.0]).unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 4 }));

    let mut index = VectorIndex::new();
    index.insert(chunk(0, "t"), vec![1.0, 2.0, 3.0]).unwrap();
    let err = index.search(&[1.0, 2.0, 3.0, 4.0], 1).unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 4 }));
}

#[test]
fn zero_query_is_degenerate() {
    let mut index = VectorIndex::new();
    index.insert(chunk(0, "t"), vec![1.0, 0.0]).unwrap();
    assert!(matches!(index.search(&[0.0, 0.0], 1), Err(RagError::DegenerateVector)));
}

#[tokio::test]
async fn build_is_a_no_op_once_populated() {
    let provider = Arc::new(MockEmbeddingProvider::new(4));
    let client = EmbeddingClient::new(provider.clone()).with_batch_size(2);
    let chunks: Vec<Chunk> =
        ["calm", "focus", "rest"].iter().enumerate().map(|(i, t)| chunk(i, t)).collect();

    let mut index = VectorIndex::new();
    assert_eq!(index.build(&client, chunks.clone()).await.unwrap(), 3);
    let calls_after_first = provider.batch_calls();
    assert_eq!(calls_after_first, 2);

    assert_eq!(index.build(&client, chunks).await.unwrap(), 0);
    assert_eq!(index.len(), 3);
    assert_eq!(provider.batch_calls(), calls_after_first);
}

#[tokio::test]
async fn failed_build_leaves_index_empty() {
    let provider = Arc::new(MockEmbeddingProvider::new(4).failing_first(1));
    let client = EmbeddingClient::new(provider).with_batch_size(1).with_concurrency_limit(1);
    let chunks = vec![chunk(0, "a"), chunk(1, "b")];

    let mut index = VectorIndex::new();
    let err = index.build(&client, chunks).await.unwrap_err();
    match err {
        RagError::EmbeddingProvider { failed, .. } => assert_eq!(failed, vec![0]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(index.is_empty());
}
