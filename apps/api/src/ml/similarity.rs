//! Cosine similarity calculations

use ndarray::ArrayView1;

/// Cosine similarity between two embeddings, in `[-1, 1]`.
///
/// Returns `None` when the dimensions differ. A zero-norm vector (such as the
/// placeholder embedding of a product without description) scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let a_view = ArrayView1::from(a);
    let b_view = ArrayView1::from(b);

    let dot_product = a_view.dot(&b_view) as f64;
    let norm_a = (a_view.dot(&a_view) as f64).sqrt();
    let norm_b = (b_view.dot(&b_view) as f64).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    Some((dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
