//! Dashboard view models computed per request from the scored dataset

use crate::serving::context::ServingContext;
use crate::serving::error::ApiError;
use crate::types::scored::ScoredTransaction;
use serde::{Deserialize, Serialize};

const PROBABILITY_STEP: f64 = 0.01;

/// Raw query string of `GET /api/dashboard`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DashboardQuery {
    pub prob_threshold: Option<f64>,
    pub min_amount: Option<f64>,
}

/// Validated dashboard filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardFilter {
    pub prob_threshold: f64,
    pub min_amount: f64,
}

impl DashboardFilter {
    /// Fill unset fields from the control defaults and validate the rest
    pub fn resolve(query: DashboardQuery, ctx: &ServingContext) -> Result<Self, ApiError> {
        let prob_threshold = query
            .prob_threshold
            .unwrap_or(ctx.config().default_threshold);
        let min_amount = query.min_amount.unwrap_or(ctx.amount_range().0);

        if !(0.0..=1.0).contains(&prob_threshold) {
            return Err(ApiError::InvalidQuery(format!(
                "prob_threshold must be within [0, 1], got {}",
                prob_threshold
            )));
        }
        if !min_amount.is_finite() {
            return Err(ApiError::InvalidQuery(format!(
                "min_amount must be a finite number, got {}",
                min_amount
            )));
        }

        Ok(Self {
            prob_threshold,
            min_amount,
        })
    }

    pub fn matches(&self, scored: &ScoredTransaction) -> bool {
        scored.fraud_probability() >= self.prob_threshold && scored.amount() >= self.min_amount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width bins over [0, 1]; 1.0 lands in the last bin
pub fn probability_histogram<I>(probabilities: I, n_bins: usize) -> Vec<HistogramBin>
where
    I: IntoIterator<Item = f64>,
{
    let n_bins = n_bins.max(1);
    let width = 1.0 / n_bins as f64;
    let mut bins: Vec<HistogramBin> = (0..n_bins)
        .map(|i| HistogramBin {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count: 0,
        })
        .collect();

    for p in probabilities {
        if !(0.0..=1.0).contains(&p) {
            continue;
        }
        let idx = ((p * n_bins as f64) as usize).min(n_bins - 1);
        bins[idx].count += 1;
    }
    bins
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeShare {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: usize,
    pub share: f64,
}

/// Count and share of every category, including ones the filter removed
pub fn type_breakdown(categories: &[String], matched: &[&ScoredTransaction]) -> Vec<TypeShare> {
    let total = matched.len();
    categories
        .iter()
        .map(|kind| {
            let count = matched.iter().filter(|s| s.kind() == kind).count();
            TypeShare {
                kind: kind.clone(),
                count,
                share: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                },
            }
        })
        .collect()
}

/// One row of the top-risk ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTransaction {
    pub name_orig: String,
    pub fraud_probability: f64,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub balance_diff_org: f64,
    pub balance_diff_dest: f64,
}

impl From<&ScoredTransaction> for TopTransaction {
    fn from(s: &ScoredTransaction) -> Self {
        Self {
            name_orig: s.transaction.name_orig.clone(),
            fraud_probability: s.fraud_probability(),
            amount: s.amount(),
            kind: s.kind().to_string(),
            balance_diff_org: s.balance_diff_org,
            balance_diff_dest: s.balance_diff_dest,
        }
    }
}

/// Highest probabilities first; equal probabilities keep dataset order
pub fn top_transactions(matched: &[&ScoredTransaction], n: usize) -> Vec<TopTransaction> {
    if n == 0 {
        return Vec::new();
    }
    let by_risk = |a: &(usize, &ScoredTransaction), b: &(usize, &ScoredTransaction)| {
        b.1.fraud_probability()
            .total_cmp(&a.1.fraud_probability())
            .then(a.0.cmp(&b.0))
    };

    let mut ranked: Vec<(usize, &ScoredTransaction)> = matched.iter().copied().enumerate().collect();
    if ranked.len() > n {
        ranked.select_nth_unstable_by(n - 1, by_risk);
        ranked.truncate(n);
    }
    ranked.sort_unstable_by(by_risk);
    ranked.into_iter().map(|(_, s)| TopTransaction::from(s)).collect()
}

/// Response body of `GET /api/dashboard`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filter: DashboardFilter,
    pub matched: usize,
    pub total: usize,
    pub histogram: Vec<HistogramBin>,
    pub type_breakdown: Vec<TypeShare>,
    pub top_transactions: Vec<TopTransaction>,
}

impl DashboardView {
    pub fn build(ctx: &ServingContext, filter: DashboardFilter) -> Self {
        let matched: Vec<&ScoredTransaction> =
            ctx.scored().iter().filter(|s| filter.matches(s)).collect();

        Self {
            filter,
            matched: matched.len(),
            total: ctx.scored().len(),
            histogram: probability_histogram(
                matched.iter().map(|s| s.fraud_probability()),
                ctx.config().histogram_bins,
            ),
            type_breakdown: type_breakdown(ctx.categories(), &matched),
            top_transactions: top_transactions(&matched, ctx.config().top_n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderControl {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

/// Response body of `GET /api/controls`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlsView {
    pub prob_threshold: SliderControl,
    pub min_amount: SliderControl,
}

impl ControlsView {
    pub fn build(ctx: &ServingContext) -> Self {
        let (min, max) = ctx.amount_range();
        Self {
            prob_threshold: SliderControl {
                min: 0.0,
                max: 1.0,
                step: PROBABILITY_STEP,
                default: ctx.config().default_threshold,
            },
            min_amount: SliderControl {
                min,
                max,
                step: ctx.config().amount_step,
                default: min,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::context::fixture;

    fn filter(prob_threshold: f64, min_amount: f64) -> DashboardFilter {
        DashboardFilter {
            prob_threshold,
            min_amount,
        }
    }

    #[test]
    fn test_histogram_edges() {
        let bins = probability_histogram(vec![0.0, 0.019, 0.02, 0.5, 1.0], 50);

        assert_eq!(bins.len(), 50);
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[1].count, 1);
        assert_eq!(bins[25].count, 1);
        assert_eq!(bins[49].count, 1);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn test_top_transactions_partial_ranking() {
        let ctx = fixture::context();
        let matched: Vec<&ScoredTransaction> = ctx.scored().iter().collect();

        let mut expected: Vec<(usize, f64)> = matched
            .iter()
            .map(|s| s.fraud_probability())
            .enumerate()
            .collect();
        expected.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        for n in [0, 1, 3, 10, 60, 100] {
            let top = top_transactions(&matched, n);
            assert_eq!(top.len(), n.min(60));
            for (row, (i, p)) in top.iter().zip(&expected) {
                assert_eq!(row.fraud_probability, *p);
                assert_eq!(row.name_orig, matched[*i].transaction.name_orig);
            }
        }
    }

    #[test]
    fn test_equal_probabilities_keep_dataset_order() {
        let ctx = fixture::context();
        let mut rows: Vec<ScoredTransaction> = ctx.scored().iter().take(6).cloned().collect();
        for s in rows.iter_mut() {
            s.prediction.fraud_probability = 0.4;
        }
        rows[4].prediction.fraud_probability = 0.9;
        let matched: Vec<&ScoredTransaction> = rows.iter().collect();

        let names: Vec<String> = top_transactions(&matched, 3)
            .into_iter()
            .map(|t| t.name_orig)
            .collect();
        assert_eq!(names, vec!["C4", "C0", "C1"]);
    }

    #[test]
    fn test_default_view_covers_dataset() {
        let ctx = fixture::context();
        let query = DashboardQuery::default();
        let view = DashboardView::build(&ctx, DashboardFilter::resolve(query, &ctx).unwrap());

        assert_eq!(view.total, 60);
        assert_eq!(view.type_breakdown.len(), 5);
        assert!(view.top_transactions.len() <= 10);
        let probs: Vec<f64> = view.top_transactions.iter().map(|t| t.fraud_probability).collect();
        assert!(probs.windows(2).all(|w| w[0] >= w[1]));
        assert!(view.top_transactions.iter().all(|t| t.fraud_probability >= 0.5));
    }

    #[test]
    fn test_zero_threshold_keeps_every_row() {
        let ctx = fixture::context();
        let view = DashboardView::build(&ctx, filter(0.0, ctx.amount_range().0));

        assert_eq!(view.matched, 60);
        assert_eq!(view.histogram.iter().map(|b| b.count).sum::<usize>(), 60);
        let shares: f64 = view.type_breakdown.iter().map(|t| t.share).sum();
        assert!((shares - 1.0).abs() < 1e-9);
        assert_eq!(view.top_transactions.len(), 10);
        assert!(view.top_transactions.iter().all(|t| t.kind == "TRANSFER"));
    }

    #[test]
    fn test_threshold_one_gives_empty_views() {
        let ctx = fixture::context();
        let view = DashboardView::build(&ctx, filter(1.0, 0.0));

        assert_eq!(view.matched, 0);
        assert_eq!(view.histogram.len(), 50);
        assert!(view.histogram.iter().all(|b| b.count == 0));
        assert_eq!(view.type_breakdown.len(), 5);
        assert!(view.type_breakdown.iter().all(|t| t.count == 0 && t.share == 0.0));
        assert!(view.top_transactions.is_empty());
    }

    #[test]
    fn test_min_amount_filter() {
        let ctx = fixture::context();
        let view = DashboardView::build(&ctx, filter(0.0, 1000.0));

        assert_eq!(view.matched, 10);
        let transfer = view.type_breakdown.iter().find(|t| t.kind == "TRANSFER").unwrap();
        assert_eq!(transfer.count, 10);
        assert_eq!(transfer.share, 1.0);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let ctx = fixture::context();
        let bad_threshold = DashboardQuery {
            prob_threshold: Some(1.5),
            min_amount: None,
        };
        let bad_amount = DashboardQuery {
            prob_threshold: None,
            min_amount: Some(f64::INFINITY),
        };

        assert!(matches!(
            DashboardFilter::resolve(bad_threshold, &ctx),
            Err(ApiError::InvalidQuery(_))
        ));
        assert!(matches!(
            DashboardFilter::resolve(bad_amount, &ctx),
            Err(ApiError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_controls() {
        let ctx = fixture::context();
        let controls = ControlsView::build(&ctx);

        assert_eq!(controls.prob_threshold.step, 0.01);
        assert_eq!(controls.prob_threshold.default, 0.5);
        assert_eq!(controls.min_amount.min, 105.0);
        assert_eq!(controls.min_amount.max, 2540.0);
        assert_eq!(controls.min_amount.step, 1000.0);
        assert_eq!(controls.min_amount.default, 105.0);
    }
}
