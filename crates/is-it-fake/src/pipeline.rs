use core::fmt;

use sprs::CsMat;

use crate::{category::Category, error::DetectorError, model::TrainedPipeline};

/// Class probabilities for one review.
/// 0: P(Authentic), 1: P(Generated)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Prediction {
    authentic: f64,
    generated: f64,
}

impl Prediction {
    /// `authentic` + `generated` must equal 1.0
    fn new(authentic: f64, generated: f64) -> Self {
        debug_assert!(
            (authentic + generated - 1.0).abs() < 1e-9,
            "Probabilities must sum to 1.0"
        );
        Self {
            authentic,
            generated,
        }
    }

    #[must_use]
    pub fn authentic_probability(&self) -> f64 {
        self.authentic
    }

    #[must_use]
    pub fn generated_probability(&self) -> f64 {
        self.generated
    }

    #[inline]
    #[must_use]
    pub fn classification(&self, threshold: f64) -> Category {
        if self.generated >= threshold {
            Category::Generated
        } else {
            Category::Authentic
        }
    }

    /// Probability of whichever category `threshold` selects.
    #[must_use]
    pub fn confidence(&self, threshold: f64) -> f64 {
        match self.classification(threshold) {
            Category::Authentic => self.authentic,
            Category::Generated => self.generated,
        }
    }

    /// `"Model confidence: 87.12%"`
    #[must_use]
    pub fn confidence_annotation(&self, threshold: f64) -> String {
        format!("Model confidence: {:.2}%", self.confidence(threshold) * 100.0)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P(Authentic)={:.3}, P(Generated)={:.3}",
            self.authentic, self.generated
        )
    }
}

/// Normalizes and vectorizes raw texts with the pipeline's frozen components.
fn prepare_input<T: AsRef<str> + Sync>(pipeline: &TrainedPipeline, texts: &[T]) -> CsMat<f64> {
    let normalized = pipeline.normalizer().normalize_batch(texts);
    pipeline.vectorizer().transform(&normalized)
}

fn run_inference(
    pipeline: &TrainedPipeline,
    input: &CsMat<f64>,
) -> Result<Vec<Vec<f64>>, DetectorError> {
    let classifier = pipeline.classifier();
    if input.cols() != classifier.n_features() {
        return Err(DetectorError::Prediction(format!(
            "feature width {} does not match classifier width {}",
            input.cols(),
            classifier.n_features()
        )));
    }
    Ok(classifier.predict_proba(input))
}

/// Maps classifier output columns to categories through the class table.
fn parse_outputs(
    pipeline: &TrainedPipeline,
    probabilities: Vec<Vec<f64>>,
) -> Result<Vec<Prediction>, DetectorError> {
    let column = |category: Category| {
        pipeline
            .classes()
            .iter()
            .position(|&c| c == category)
            .ok_or_else(|| {
                DetectorError::Prediction(format!("class table has no {category} entry"))
            })
    };
    let authentic = column(Category::Authentic)?;
    let generated = column(Category::Generated)?;

    probabilities
        .into_iter()
        .map(|row| match (row.get(authentic), row.get(generated)) {
            (Some(&a), Some(&g)) if a.is_finite() && g.is_finite() => Ok(Prediction::new(a, g)),
            _ => Err(DetectorError::Prediction(format!(
                "classifier returned unusable probabilities {row:?}"
            ))),
        })
        .collect()
}

pub(crate) fn predict<T: AsRef<str> + Sync>(
    pipeline: &TrainedPipeline,
    input: T,
) -> Result<Prediction, DetectorError> {
    predict_batch(pipeline, &[input])?
        .pop()
        .ok_or_else(|| DetectorError::Prediction("classifier returned no rows".to_owned()))
}

pub(crate) fn predict_batch<T: AsRef<str> + Sync>(
    pipeline: &TrainedPipeline,
    inputs: &[T],
) -> Result<Vec<Prediction>, DetectorError> {
    let input = prepare_input(pipeline, inputs);
    let probabilities = run_inference(pipeline, &input)?;
    parse_outputs(pipeline, probabilities)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::model::artifact::tests::toy_pipeline;

    #[rstest]
    #[case(0.5, Category::Generated)]
    #[case(0.3, Category::Generated)]
    #[case(0.7, Category::Authentic)]
    fn test_classification_threshold(#[case] threshold: f64, #[case] expected: Category) {
        let prediction = Prediction::new(0.4, 0.6);
        assert_eq!(prediction.classification(threshold), expected);
    }

    #[test]
    fn test_confidence_annotation() {
        let prediction = Prediction::new(0.128_8, 0.871_2);
        assert_eq!(
            prediction.confidence_annotation(0.5),
            "Model confidence: 87.12%"
        );
        let prediction = Prediction::new(0.9, 0.1);
        assert_eq!(
            prediction.confidence_annotation(0.5),
            "Model confidence: 90.00%"
        );
    }

    #[test]
    fn test_predict_batch_keeps_order() {
        let pipeline = toy_pipeline();
        let predictions = predict_batch(
            &pipeline,
            &[
                "Amazing! Best perfect buy",
                "The item arrived broken, so disappointed",
            ],
        )
        .unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].classification(0.5), Category::Generated);
        assert_eq!(predictions[1].classification(0.5), Category::Authentic);
    }

    #[test]
    fn test_unknown_words_use_prior() {
        let pipeline = toy_pipeline();
        let prediction = predict(&pipeline, "zzz qqq").unwrap();
        assert!((prediction.authentic_probability() - 0.5).abs() < 1e-9);
    }
}
