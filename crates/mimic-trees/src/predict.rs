//! Class distributions and the probability helpers shared by the ensembles.

/// Floor applied before taking the log of a probability.
pub const LOG_FLOOR: f64 = 1e-9;

/// Class probability distribution from a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    /// Create a new class distribution.
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Build a distribution by applying softmax to per-class logits.
    #[must_use]
    pub fn from_logits(mut logits: Vec<f64>) -> Self {
        softmax_in_place(&mut logits);
        Self { probs: logits }
    }

    /// Return the predicted class (argmax of probabilities, first on ties).
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        argmax(&self.probs)
    }

    /// Return the probability of the predicted class.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.probs.get(self.predicted_class()).copied().unwrap_or(0.0)
    }

    /// Return the top-k classes sorted by descending probability.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        indexed
    }

    /// Return the probability distribution as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.probs.len()
    }
}

/// Index of the largest value; the first one wins on ties. Returns 0 when empty.
#[must_use]
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Numerically stable softmax, in place.
pub fn softmax_in_place(logits: &mut [f64]) {
    if logits.is_empty() {
        return;
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in logits.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        logits.iter_mut().for_each(|v| *v /= sum);
    }
}

/// Natural log with [`LOG_FLOOR`] applied, so zero probabilities stay finite.
#[must_use]
pub fn floored_ln(p: f64) -> f64 {
    p.max(LOG_FLOOR).ln()
}
