//! DBSCAN clustering engine and clustering quality metrics

use crate::error::{AnalysisError, Result};
use linfa::traits::Transformer;
use linfa::ParamGuard;
use linfa_clustering::Dbscan;
use linfa_nn::distance::{Distance, L2Dist};
use ndarray::{Array2, ArrayView1};
use serde::Serialize;
use std::collections::BTreeMap;

/// Label assigned to points that belong to no cluster
pub const NOISE: i32 = -1;

/// DBSCAN hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DbscanParams {
    /// Neighborhood radius
    pub eps: f64,
    /// Points (self included) needed within `eps` to form a core point
    pub min_samples: usize,
}

impl DbscanParams {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "eps must be a positive finite number, got {}",
                self.eps
            )));
        }
        if self.min_samples < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "min_samples must be at least 2, got {}",
                self.min_samples
            )));
        }
        Ok(())
    }
}

/// Per-row cluster assignments, in input order
///
/// `NOISE` marks outliers; clusters are numbered `0..k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLabels {
    labels: Vec<i32>,
}

impl ClusterLabels {
    pub fn new(labels: Vec<i32>) -> Self {
        Self { labels }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct label values in ascending order (noise first when present)
    pub fn distinct(&self) -> Vec<i32> {
        self.cluster_sizes().into_iter().map(|(label, _)| label).collect()
    }

    pub fn has_noise(&self) -> bool {
        self.labels.contains(&NOISE)
    }

    /// Number of non-noise clusters
    pub fn n_clusters(&self) -> usize {
        let distinct = self.distinct().len();
        if self.has_noise() {
            distinct - 1
        } else {
            distinct
        }
    }

    /// Indices of rows labeled as noise
    pub fn outlier_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == NOISE)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn outlier_count(&self) -> usize {
        self.labels.iter().filter(|&&label| label == NOISE).count()
    }

    /// Row count per label, in ascending label order
    pub fn cluster_sizes(&self) -> Vec<(i32, usize)> {
        let mut sizes = BTreeMap::new();
        for &label in &self.labels {
            *sizes.entry(label).or_insert(0usize) += 1;
        }
        sizes.into_iter().collect()
    }
}

/// Run DBSCAN once over a (standardized) feature matrix
///
/// Neighborhoods are closed balls (`distance <= eps`) that include the
/// point itself. Clusters are grown from core points in row order, so a
/// border point joins the first cluster that reaches it.
///
/// # Arguments
/// * `features` - Standardized feature matrix, one row per entity
/// * `params` - `eps` radius and `min_samples` core threshold
///
/// # Returns
/// One label per row: `NOISE` for outliers, `0..k` for clusters
pub fn cluster(features: &Array2<f64>, params: DbscanParams) -> Result<ClusterLabels> {
    params.validate()?;
    if features.nrows() == 0 {
        return Err(AnalysisError::InvalidInput(
            "cannot cluster an empty feature matrix".to_string(),
        ));
    }

    let memberships = Dbscan::params(params.min_samples)
        .tolerance(params.eps)
        .check()
        .map_err(|e| AnalysisError::InvalidInput(format!("invalid DBSCAN parameters: {}", e)))?
        .transform(features);

    let labels = memberships
        .iter()
        .map(|membership| membership.map_or(NOISE, |c| c as i32))
        .collect();

    Ok(ClusterLabels::new(labels))
}

/// Mean silhouette coefficient over all rows
///
/// Noise is scored as an ordinary label. Rows in singleton clusters
/// contribute 0.
pub fn silhouette_score(features: &Array2<f64>, labels: &ClusterLabels) -> Result<f64> {
    let n_samples = features.nrows();
    if labels.len() != n_samples {
        return Err(AnalysisError::ParameterSearch(format!(
            "{} labels for {} rows",
            labels.len(),
            n_samples
        )));
    }

    let distinct = labels.distinct();
    let n_labels = distinct.len();
    if n_labels < 2 || n_labels > n_samples.saturating_sub(1) {
        return Err(AnalysisError::ParameterSearch(format!(
            "number of labels is {}, silhouette needs 2 to n_samples - 1 ({})",
            n_labels,
            n_samples.saturating_sub(1)
        )));
    }

    let position: BTreeMap<i32, usize> = distinct
        .iter()
        .enumerate()
        .map(|(pos, &label)| (label, pos))
        .collect();
    let members: Vec<usize> = labels.as_slice().iter().map(|l| position[l]).collect();
    let mut sizes = vec![0usize; n_labels];
    for &c in &members {
        sizes[c] += 1;
    }

    let distances = pairwise_distances(features);
    let mut silhouette_sum = 0.0;

    for (i, row) in distances.outer_iter().enumerate() {
        let own = members[i];
        if sizes[own] < 2 {
            continue;
        }

        let mut sums = vec![0.0; n_labels];
        for (j, &d) in row.iter().enumerate() {
            sums[members[j]] += d;
        }

        // a(i): mean distance to the rest of its own cluster
        let a_i = sums[own] / (sizes[own] - 1) as f64;

        // b(i): smallest mean distance to any other cluster
        let b_i = (0..n_labels)
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denominator = a_i.max(b_i);
        if denominator > 0.0 {
            silhouette_sum += (b_i - a_i) / denominator;
        }
    }

    Ok(silhouette_sum / n_samples as f64)
}

/// Euclidean distance between two rows
pub fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    L2Dist.distance(a, b)
}

fn pairwise_distances(features: &Array2<f64>) -> Array2<f64> {
    let n = features.nrows();
    let mut distances = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean_distance(features.row(i), features.row(j));
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }
    distances
}
