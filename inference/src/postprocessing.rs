//! Postprocessing of raw model scores into classification results

use crate::types::{ClassificationResult, ScoreVector};

/// Pick the highest-scoring digit.
///
/// Confidence is the raw score at that digit, exactly as the model emitted
/// it (no softmax). Ties go to the lowest digit.
pub fn decode_scores(scores: &ScoreVector) -> ClassificationResult {
    let digit = scores.argmax();
    ClassificationResult {
        predicted_digit: digit as u8,
        confidence: scores.as_slice()[digit],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_picks_highest_score() {
        let scores = ScoreVector::new([0.1, 0.2, 0.05, 0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let result = decode_scores(&scores);
        assert_eq!(result.predicted_digit, 3);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_decode_tie_goes_to_lowest_digit() {
        let scores = ScoreVector::new([0.0, 0.0, 0.7, 0.0, 0.0, 0.7, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(decode_scores(&scores).predicted_digit, 2);

        let flat = ScoreVector::new([0.25; 10]);
        assert_eq!(decode_scores(&flat).predicted_digit, 0);
    }

    #[test]
    fn test_confidence_is_raw_score() {
        // logits, not probabilities
        let scores = ScoreVector::new([-3.0, 12.5, 4.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 7.25]);
        let result = decode_scores(&scores);
        assert_eq!(result.predicted_digit, 1);
        assert_eq!(result.confidence, 12.5);
    }

    #[test]
    fn test_result_display() {
        let result = ClassificationResult {
            predicted_digit: 7,
            confidence: 0.5,
        };
        assert_eq!(
            result.to_string(),
            "Prediction Result: 7\nConfidence: 0.500000"
        );
    }
}
