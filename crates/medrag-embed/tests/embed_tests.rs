use medrag_core::config::{EmbeddingProvider, EmbeddingSettings};
use medrag_embed::{get_default_embedder, FakeEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingProvider::Fake, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.embedder_id(), "fake:xxh64:d1024");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_rank_closer() {
    let e = FakeEmbedder::new(256);
    let query = e.embed_text("migraine aura photophobia");
    let near = e.embed_text("Migraine - Symptoms: aura");
    let far = e.embed_text("Asthma - Risk Factors: smoking");
    assert!(cosine(&query, &near) > cosine(&query, &far));
}

#[test]
fn empty_text_is_zero_vector() {
    let e = FakeEmbedder::new(8);
    assert!(e.embed_text("").iter().all(|x| *x == 0.0));
}
