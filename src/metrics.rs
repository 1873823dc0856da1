//! Held-out evaluation metrics for the fraud classifier.

use ndarray::Array1;
use serde::Serialize;
use std::fmt;

/// Binary confusion matrix with fraud as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<u8>, y_pred: &Array1<u8>) -> Self {
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (1, 1) => cm.true_positives += 1,
                (1, _) => cm.false_negatives += 1,
                (_, 1) => cm.false_positives += 1,
                _ => cm.true_negatives += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.total().to_string().len();
        writeln!(
            f,
            "[[{:>w$} {:>w$}]",
            self.true_negatives,
            self.false_positives,
            w = width
        )?;
        write!(
            f,
            " [{:>w$} {:>w$}]]",
            self.false_negatives,
            self.true_positives,
            w = width
        )
    }
}

/// Precision, recall, F1 and support of one class or average
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(true_pos: usize, false_pos: usize, false_neg: usize) -> Self {
        let precision = ratio(true_pos, true_pos + false_pos);
        let recall = ratio(true_pos, true_pos + false_neg);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: true_pos + false_neg,
        }
    }
}

/// Zero when the denominator is zero
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class and averaged metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub legitimate: ClassMetrics,
    pub fraud: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let legitimate = ClassMetrics::new(cm.true_negatives, cm.false_negatives, cm.false_positives);
        let fraud = ClassMetrics::new(cm.true_positives, cm.false_positives, cm.false_negatives);
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (legitimate.precision + fraud.precision) / 2.0,
            recall: (legitimate.recall + fraud.recall) / 2.0,
            f1: (legitimate.f1 + fraud.f1) / 2.0,
            support: total,
        };

        let weight = |a: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (a * legitimate.support as f64 + b * fraud.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(legitimate.precision, fraud.precision),
            recall: weight(legitimate.recall, fraud.recall),
            f1: weight(legitimate.f1, fraud.f1),
            support: total,
        };

        Self {
            legitimate,
            fraud,
            accuracy: ratio(cm.true_negatives + cm.true_positives, total),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>10} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (name, m) in [("0", &self.legitimate), ("1", &self.fraud)] {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

/// Area under the ROC curve from fraud probabilities.
///
/// Tied scores share their average rank. `None` when only one class is
/// present.
pub fn roc_auc(y_true: &Array1<u8>, scores: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based
        let avg_rank = (start + end + 1) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        positive_rank_sum += avg_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Everything printed after evaluating on the held-out split
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
    pub roc_auc: Option<f64>,
}

impl Evaluation {
    pub fn new(y_true: &Array1<u8>, y_pred: &Array1<u8>, probabilities: &Array1<f64>) -> Self {
        let confusion = ConfusionMatrix::from_labels(y_true, y_pred);
        Self {
            confusion,
            report: ClassificationReport::from_confusion(&confusion),
            roc_auc: roc_auc(y_true, probabilities),
        }
    }

    pub fn frauds_detected(&self) -> usize {
        self.confusion.true_positives
    }

    pub fn total_frauds(&self) -> usize {
        self.confusion.true_positives + self.confusion.false_negatives
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Classification Report ===")?;
        writeln!(f, "{}", self.report)?;
        writeln!(f, "=== Confusion Matrix ===")?;
        writeln!(f, "{}", self.confusion)?;
        if let Some(auc) = self.roc_auc {
            writeln!(f, "\nROC AUC: {:.4}", auc)?;
        }
        write!(
            f,
            "\nFraud detection accuracy: {}/{} actual frauds detected.",
            self.frauds_detected(),
            self.total_frauds()
        )
    }
}
