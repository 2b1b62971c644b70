//! Per-image verdict produced by decision fusion.

use serde::{Deserialize, Serialize};

/// Image-level classification after region and global fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Fused class scores, one per class of the taxonomy.
    pub probabilities: Vec<f32>,
    /// Index of the highest-scoring class.
    pub label: usize,
    /// Human-readable class name, when a taxonomy was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_name: Option<String>,
    /// Score of the winning class.
    pub confidence: f32,
}

impl Verdict {
    /// Builds a verdict from a class vector, picking the argmax.
    ///
    /// Ties resolve to the lowest class index. Returns `None` for an empty vector.
    pub fn from_probabilities(probabilities: Vec<f32>, class_names: Option<&[String]>) -> Option<Self> {
        let (label, confidence) = probabilities.iter().copied().enumerate().fold(
            None,
            |best: Option<(usize, f32)>, (idx, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((idx, value)),
            },
        )?;
        let label_name = class_names.and_then(|names| names.get(label).cloned());
        Some(Self {
            probabilities,
            label,
            label_name,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_and_name() {
        let names = vec!["ok".to_string(), "scratch".to_string(), "dent".to_string()];
        let verdict = Verdict::from_probabilities(vec![0.2, 0.7, 0.1], Some(&names)).unwrap();
        assert_eq!(verdict.label, 1);
        assert_eq!(verdict.label_name.as_deref(), Some("scratch"));
        assert!((verdict.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_ties_pick_first() {
        let verdict = Verdict::from_probabilities(vec![0.5, 0.5], None).unwrap();
        assert_eq!(verdict.label, 0);
        assert!(verdict.label_name.is_none());
    }

    #[test]
    fn test_empty_vector() {
        assert!(Verdict::from_probabilities(Vec::new(), None).is_none());
    }
}
