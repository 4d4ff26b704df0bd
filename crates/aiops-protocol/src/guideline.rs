use serde::{Deserialize, Serialize};

/// A ranked guidance snippet returned by the guideline retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    /// Rule identifier in the guideline corpus.
    pub id: String,
    pub text: String,
    /// Similarity-derived confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Guideline {
    /// Confidence from a similarity distance: `max(0, 1 - distance)`, capped at 1.
    pub fn confidence_from_distance(distance: f64) -> f64 {
        (1.0 - distance).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Guideline::confidence_from_distance(0.25), 0.75);
        assert_eq!(Guideline::confidence_from_distance(1.7), 0.0);
        assert_eq!(Guideline::confidence_from_distance(-0.1), 1.0);
    }
}
