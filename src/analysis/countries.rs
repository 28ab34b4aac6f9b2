use super::{segment, Segmentation};
use crate::data::{into_feature_table, CountryRow};
use crate::error::Result;
use crate::model::DbscanParams;
use crate::tuning::MinSamplesRange;
use crate::viz::{ScatterPlot, Visualizer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryOutlier {
    pub country: String,
    pub total_orders: f64,
    pub average_order_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCluster {
    pub country: String,
    pub cluster: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryAnalysis {
    pub total_countries: usize,
    pub number_of_clusters: usize,
    pub outliers_count: usize,
    pub parameters: DbscanParams,
    pub outliers: Vec<CountryOutlier>,
    pub clusters: Vec<CountryCluster>,
}

pub(super) fn analyze(
    rows: Vec<CountryRow>,
    search: MinSamplesRange,
    visualizer: &dyn Visualizer,
) -> Result<CountryAnalysis> {
    let table = into_feature_table(rows, "country")?;
    let Segmentation { params, labels } = segment(&table.features, search)?;

    visualizer.render(&ScatterPlot {
        title: ScatterPlot::title_for("Country Sales Pattern Analysis", &params),
        x_label: "Total Orders".to_string(),
        y_label: "Average Order Amount".to_string(),
        points: table.column_pairs("total_orders", "average_order_amount"),
        labels: labels.as_slice().to_vec(),
    })?;

    let outliers = labels
        .outlier_indices()
        .into_iter()
        .map(|i| CountryOutlier {
            country: table.rows[i].country.clone(),
            total_orders: table.features[[i, 0]],
            average_order_amount: table.features[[i, 1]],
        })
        .collect();

    let clusters = table
        .rows
        .iter()
        .zip(labels.as_slice())
        .map(|(row, &cluster)| CountryCluster {
            country: row.country.clone(),
            cluster,
        })
        .collect();

    Ok(CountryAnalysis {
        total_countries: table.len(),
        number_of_clusters: labels.n_clusters(),
        outliers_count: labels.outlier_count(),
        parameters: params,
        outliers,
        clusters,
    })
}
