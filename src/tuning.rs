//! Automatic selection of DBSCAN `eps` and `min_samples`
//!
//! For every candidate `min_samples` the k-distance curve is built, its
//! elbow gives a candidate `eps`, and the resulting clustering is scored
//! with the silhouette coefficient. The best scoring pair wins.

use crate::error::{AnalysisError, Result};
use crate::model::{self, DbscanParams};
use linfa_nn::distance::L2Dist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use ndarray::Array2;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// Fallback `eps` when no candidate produces a usable clustering
pub const DEFAULT_EPS: f64 = 0.3;
/// Fallback `min_samples` when no candidate produces a usable clustering
pub const DEFAULT_MIN_SAMPLES: usize = 3;
/// Largest `min_samples` the search will accept as an upper bound
pub const MAX_MIN_SAMPLES: usize = 64;

/// Inclusive range of `min_samples` values to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinSamplesRange {
    lo: usize,
    hi: usize,
}

impl MinSamplesRange {
    pub fn new(lo: usize, hi: usize) -> Result<Self> {
        if lo < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "min_samples range must start at 2 or more, got {}",
                lo
            )));
        }
        if lo > hi {
            return Err(AnalysisError::InvalidInput(format!(
                "min_samples range {}..{} is empty",
                lo, hi
            )));
        }
        if hi > MAX_MIN_SAMPLES {
            return Err(AnalysisError::InvalidInput(format!(
                "min_samples range upper bound {} exceeds {}",
                hi, MAX_MIN_SAMPLES
            )));
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> usize {
        self.lo
    }

    pub fn hi(&self) -> usize {
        self.hi
    }

    pub fn iter(&self) -> RangeInclusive<usize> {
        self.lo..=self.hi
    }
}

impl Default for MinSamplesRange {
    fn default() -> Self {
        Self { lo: 2, hi: 10 }
    }
}

impl std::str::FromStr for MinSamplesRange {
    type Err = AnalysisError;

    /// Parses `lo..hi` (both bounds inclusive)
    fn from_str(s: &str) -> Result<Self> {
        let (lo, hi) = s.split_once("..").ok_or_else(|| {
            AnalysisError::InvalidInput(format!("expected 'lo..hi', got '{}'", s))
        })?;
        let parse = |part: &str| {
            part.trim().parse::<usize>().map_err(|_| {
                AnalysisError::InvalidInput(format!("invalid min_samples bound: '{}'", part))
            })
        };
        Self::new(parse(lo)?, parse(hi)?)
    }
}

/// Outcome of scoring one `min_samples` candidate
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoredCandidate {
    params: DbscanParams,
    score: f64,
}

/// Pick `eps` and `min_samples` for a standardized feature matrix
///
/// Returns `(DEFAULT_EPS, DEFAULT_MIN_SAMPLES)` when every candidate is
/// skipped. Ties keep the earliest `min_samples`.
///
/// # Arguments
/// * `features` - Standardized feature matrix
/// * `range` - Inclusive `min_samples` values to try
///
/// # Returns
/// The best scoring `DbscanParams`, or the defaults
pub fn select_parameters(features: &Array2<f64>, range: MinSamplesRange) -> Result<DbscanParams> {
    if features.nrows() == 0 || features.ncols() == 0 {
        return Err(AnalysisError::InvalidInput(
            "cannot search parameters for an empty feature matrix".to_string(),
        ));
    }

    info!(
        "Starting parameter search over min_samples {}..={} ({} rows)",
        range.lo(),
        range.hi(),
        features.nrows()
    );

    let index = CommonNearestNeighbour::LinearSearch.from_batch(features, L2Dist)?;
    let mut best: Option<ScoredCandidate> = None;

    for min_samples in range.iter() {
        debug!("Testing min_samples={}", min_samples);

        let Some(candidate) = evaluate_candidate(features, index.as_ref(), min_samples)? else {
            continue;
        };
        info!(
            "Score for eps={:.3}, min_samples={}: {:.3}",
            candidate.params.eps, candidate.params.min_samples, candidate.score
        );

        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    let params = match best {
        Some(candidate) => candidate.params,
        None => {
            warn!("No valid parameters found, using defaults");
            DbscanParams::new(DEFAULT_EPS, DEFAULT_MIN_SAMPLES)
        }
    };

    info!(
        "Optimal parameters found: eps={:.3}, min_samples={}",
        params.eps, params.min_samples
    );
    Ok(params)
}

/// Score a single `min_samples`; `None` means the candidate is skipped
fn evaluate_candidate(
    features: &Array2<f64>,
    index: &dyn NearestNeighbourIndex<f64>,
    min_samples: usize,
) -> Result<Option<ScoredCandidate>> {
    if min_samples > features.nrows() {
        warn!(
            "min_samples={} exceeds the {} available rows, skipping",
            min_samples,
            features.nrows()
        );
        return Ok(None);
    }

    let curve = k_distance_curve(features, index, min_samples)?;
    let Some(elbow) = find_elbow(&curve) else {
        warn!("No elbow found for min_samples={}", min_samples);
        return Ok(None);
    };

    let eps = curve[elbow];
    if eps <= 0.0 {
        warn!(
            "Elbow for min_samples={} sits at distance 0, skipping",
            min_samples
        );
        return Ok(None);
    }

    let params = DbscanParams::new(eps, min_samples);
    let labels = model::cluster(features, params)?;
    if labels.distinct().len() <= 1 {
        warn!(
            "Invalid clustering for eps={:.3}, min_samples={}",
            eps, min_samples
        );
        return Ok(None);
    }

    let score = model::silhouette_score(features, &labels)?;
    Ok(Some(ScoredCandidate { params, score }))
}

/// Sorted distance from every row to its `k`-th nearest neighbor
///
/// The row itself is part of the neighbor query and is always the first
/// neighbor, at distance 0.
pub fn k_distance_curve(
    features: &Array2<f64>,
    index: &dyn NearestNeighbourIndex<f64>,
    k: usize,
) -> Result<Vec<f64>> {
    if k == 0 || k > features.nrows() {
        return Err(AnalysisError::ParameterSearch(format!(
            "cannot query {} neighbors among {} rows",
            k,
            features.nrows()
        )));
    }

    let mut curve = Vec::with_capacity(features.nrows());
    for row in features.outer_iter() {
        let neighbors = index.k_nearest(row.view(), k)?;
        if neighbors.len() != k {
            return Err(AnalysisError::ParameterSearch(format!(
                "neighbor query returned {} points, expected {}",
                neighbors.len(),
                k
            )));
        }
        let kth = neighbors
            .iter()
            .map(|(point, _)| model::euclidean_distance(row.view(), point.view()))
            .fold(0.0, f64::max);
        curve.push(kth);
    }

    curve.sort_by(|a, b| a.total_cmp(b));
    Ok(curve)
}

/// Locate the elbow of a sorted, increasing, convex curve
///
/// Kneedle with sensitivity 1, first knee only. The curve is normalized
/// to the unit square and flipped so the elbow becomes a knee of the
/// difference curve; the knee is the first local maximum after which the
/// difference curve drops below that maximum's threshold.
pub fn find_elbow(curve: &[f64]) -> Option<usize> {
    let n = curve.len();
    if n < 2 {
        return None;
    }

    let lo = curve.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = curve.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    if !(span.is_finite() && span > 0.0) {
        return None;
    }

    let last = (n - 1) as f64;
    let difference: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 / last;
            let y = 1.0 - (curve[n - 1 - i] - lo) / span;
            y - x
        })
        .collect();

    let neighbors = |i: usize| (difference[i.saturating_sub(1)], difference[(i + 1).min(n - 1)]);
    let is_maximum = |i: usize| {
        let (prev, next) = neighbors(i);
        difference[i] >= prev && difference[i] >= next
    };
    let is_minimum = |i: usize| {
        let (prev, next) = neighbors(i);
        difference[i] <= prev && difference[i] <= next
    };

    let first_maximum = (0..n).find(|&i| is_maximum(i))?;
    let step = 1.0 / last;

    let mut threshold = f64::NEG_INFINITY;
    let mut threshold_index = first_maximum;
    for i in first_maximum..n - 1 {
        if is_maximum(i) {
            threshold = difference[i] - step;
            threshold_index = i;
        }
        if is_minimum(i) {
            threshold = 0.0;
        }
        if difference[i + 1] < threshold {
            return Some(n - 1 - threshold_index);
        }
    }

    None
}
