// ============================================================
// Layer 5 — Scoring Metrics
// ============================================================
// Binary classification metrics accumulated batch by batch and
// read once per epoch. Every metric thresholds probabilities at
// 0.5 and works off the same confusion counts.

use serde::{Deserialize, Serialize};

pub const THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn update(&mut self, probs: &[f32], targets: &[u8]) {
        for (&p, &t) in probs.iter().zip(targets) {
            match (p >= THRESHOLD, t == 1) {
                (true, true)   => self.tp += 1,
                (true, false)  => self.fp += 1,
                (false, false) => self.tn += 1,
                (false, true)  => self.fn_ += 1,
            }
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

pub trait Metric: Send {
    /// Short name used in logs ("acc" → "train_acc", "val_acc")
    fn name(&self) -> &'static str;
    fn update(&mut self, probs: &[f32], targets: &[u8]);
    fn compute(&self) -> f64;
    fn reset(&mut self);
}

macro_rules! confusion_metric {
    ($ty:ident, $name:literal, |$c:ident| $body:expr) => {
        #[derive(Debug, Clone, Default)]
        pub struct $ty {
            counts: Confusion,
        }

        impl Metric for $ty {
            fn name(&self) -> &'static str { $name }
            fn update(&mut self, probs: &[f32], targets: &[u8]) { self.counts.update(probs, targets) }
            fn compute(&self) -> f64 {
                let $c = &self.counts;
                $body
            }
            fn reset(&mut self) { self.counts = Confusion::default() }
        }
    };
}

confusion_metric!(Accuracy,  "acc",  |c| ratio(c.tp + c.tn, c.total()));
confusion_metric!(Precision, "prec", |c| ratio(c.tp, c.tp + c.fp));
confusion_metric!(Recall,    "rec",  |c| ratio(c.tp, c.tp + c.fn_));
confusion_metric!(F1Score,   "f1",   |c| {
    let p = ratio(c.tp, c.tp + c.fp);
    let r = ratio(c.tp, c.tp + c.fn_);
    if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
});

/// Serialisable metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl MetricKind {
    pub fn build(&self) -> Box<dyn Metric> {
        match self {
            MetricKind::Accuracy  => Box::new(Accuracy::default()),
            MetricKind::Precision => Box::new(Precision::default()),
            MetricKind::Recall    => Box::new(Recall::default()),
            MetricKind::F1        => Box::new(F1Score::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // probs → predictions [1, 1, 0, 0], truth [1, 0, 0, 1]
    const PROBS:   [f32; 4] = [0.9, 0.6, 0.2, 0.4];
    const TARGETS: [u8; 4]  = [1, 0, 0, 1];

    #[test]
    fn test_confusion_counts() {
        let mut c = Confusion::default();
        c.update(&PROBS, &TARGETS);
        assert_eq!(c, Confusion { tp: 1, fp: 1, tn: 1, fn_: 1 });
    }

    #[test]
    fn test_metric_values() {
        let mut acc = MetricKind::Accuracy.build();
        let mut prec = MetricKind::Precision.build();
        let mut f1 = MetricKind::F1.build();
        for m in [&mut acc, &mut prec, &mut f1] {
            m.update(&PROBS, &TARGETS);
        }
        assert_eq!(acc.compute(), 0.5);
        assert_eq!(prec.compute(), 0.5);
        assert_eq!(f1.compute(), 0.5);
    }

    #[test]
    fn test_accumulates_and_resets() {
        let mut acc = Accuracy::default();
        acc.update(&[0.9], &[1]);
        acc.update(&[0.1], &[1]);
        assert_eq!(acc.compute(), 0.5);
        acc.reset();
        assert_eq!(acc.compute(), 0.0);
    }

    #[test]
    fn test_precision_without_positive_predictions() {
        let mut p = Precision::default();
        p.update(&[0.1, 0.2], &[1, 0]);
        assert_eq!(p.compute(), 0.0);
    }
}
