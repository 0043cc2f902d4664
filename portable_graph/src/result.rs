/// The scores a graph assigns to one sample, one per class.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    scores: Vec<f32>,
}

impl InferenceResult {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Returns the index of the highest score, the first one on ties.
    ///
    /// `NaN` scores never win. `None` when there are no comparable scores.
    pub fn predicted_class(&self) -> Option<usize> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_nan())
            .fold(None, |best: Option<(usize, f32)>, (i, &p)| match best {
                Some((_, q)) if q >= p => best,
                _ => Some((i, p)),
            })
            .map(|(i, _)| i)
    }

    /// Returns the highest score.
    pub fn confidence(&self) -> Option<f32> {
        self.predicted_class().map(|i| self.scores[i])
    }

    pub fn is_finite(&self) -> bool {
        self.scores.iter().all(|p| p.is_finite())
    }

    /// Whether the scores add up to one, within `tolerance`.
    pub fn is_normalized(&self, tolerance: f32) -> bool {
        (self.scores.iter().sum::<f32>() - 1.).abs() <= tolerance
    }
}
