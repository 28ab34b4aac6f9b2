use super::{segment, Segmentation};
use crate::data::{into_feature_table, FeatureTable, ProductRow};
use crate::error::Result;
use crate::model::{ClusterLabels, DbscanParams};
use crate::tuning::MinSamplesRange;
use crate::viz::{ScatterPlot, Visualizer};
use serde::Serialize;

const PRICE: usize = 0;
const QUANTITY: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductOutlier {
    pub product_id: i32,
    pub product_name: String,
    pub average_sale_price: f64,
    pub total_quantity_sold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCluster {
    pub product_id: i32,
    pub product_name: String,
    pub cluster: i32,
}

/// Size and sales summary of one label, noise included
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatistics {
    pub cluster: i32,
    pub product_count: usize,
    pub average_price: f64,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAnalysis {
    pub total_products: usize,
    pub number_of_clusters: usize,
    pub outliers_count: usize,
    pub parameters: DbscanParams,
    pub outliers: Vec<ProductOutlier>,
    pub clusters: Vec<ProductCluster>,
    pub cluster_statistics: Vec<ClusterStatistics>,
    /// Base64 PNG scatter plot; kept for callers, not part of the JSON body
    #[serde(skip)]
    pub plot: String,
}

pub(super) fn analyze(
    rows: Vec<ProductRow>,
    search: MinSamplesRange,
    visualizer: &dyn Visualizer,
) -> Result<ProductAnalysis> {
    let table = into_feature_table(rows, "product")?;
    let Segmentation { params, labels } = segment(&table.features, search)?;

    let plot = visualizer.render(&ScatterPlot {
        title: ScatterPlot::title_for("Product Segmentation", &params),
        x_label: "Average Sale Price".to_string(),
        y_label: "Total Quantity Sold".to_string(),
        points: table.column_pairs("average_sale_price", "total_quantity_sold"),
        labels: labels.as_slice().to_vec(),
    })?;

    let outliers = labels
        .outlier_indices()
        .into_iter()
        .map(|i| {
            let row = &table.rows[i];
            ProductOutlier {
                product_id: row.product_id,
                product_name: row.product_name.clone(),
                average_sale_price: table.features[[i, PRICE]],
                total_quantity_sold: table.features[[i, QUANTITY]],
            }
        })
        .collect();

    let clusters = table
        .rows
        .iter()
        .zip(labels.as_slice())
        .map(|(row, &cluster)| ProductCluster {
            product_id: row.product_id,
            product_name: row.product_name.clone(),
            cluster,
        })
        .collect();

    Ok(ProductAnalysis {
        total_products: table.len(),
        number_of_clusters: labels.n_clusters(),
        outliers_count: labels.outlier_count(),
        parameters: params,
        outliers,
        clusters,
        cluster_statistics: cluster_statistics(&table, &labels),
        plot,
    })
}

fn cluster_statistics(
    table: &FeatureTable<ProductRow>,
    labels: &ClusterLabels,
) -> Vec<ClusterStatistics> {
    labels
        .cluster_sizes()
        .into_iter()
        .map(|(cluster, product_count)| {
            let (price_sum, total_quantity) = labels
                .as_slice()
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == cluster)
                .fold((0.0, 0.0), |(price, quantity), (i, _)| {
                    (
                        price + table.features[[i, PRICE]],
                        quantity + table.features[[i, QUANTITY]],
                    )
                });

            ClusterStatistics {
                cluster,
                product_count,
                average_price: price_sum / product_count as f64,
                total_quantity,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureRow;
    use crate::model::NOISE;
    use ndarray::array;

    fn row(id: i32) -> ProductRow {
        ProductRow {
            product_id: id,
            product_name: format!("Product {}", id),
            average_sale_price: None,
            total_quantity_sold: None,
            average_quantity_per_order: None,
            unique_customers: None,
        }
    }

    #[test]
    fn test_feature_column_positions() {
        assert_eq!(ProductRow::FEATURES[PRICE], "average_sale_price");
        assert_eq!(ProductRow::FEATURES[QUANTITY], "total_quantity_sold");
    }

    #[test]
    fn test_cluster_statistics_cover_noise_in_label_order() {
        let table = FeatureTable {
            rows: (1..=4).map(row).collect(),
            features: array![
                [10.0, 100.0, 1.0, 1.0],
                [20.0, 50.0, 1.0, 1.0],
                [99.0, 1.0, 1.0, 1.0],
                [30.0, 10.0, 1.0, 1.0],
            ],
        };
        let labels = ClusterLabels::new(vec![1, 1, NOISE, 0]);

        let stats = cluster_statistics(&table, &labels);
        assert_eq!(
            stats,
            vec![
                ClusterStatistics {
                    cluster: NOISE,
                    product_count: 1,
                    average_price: 99.0,
                    total_quantity: 1.0,
                },
                ClusterStatistics {
                    cluster: 0,
                    product_count: 1,
                    average_price: 30.0,
                    total_quantity: 10.0,
                },
                ClusterStatistics {
                    cluster: 1,
                    product_count: 2,
                    average_price: 15.0,
                    total_quantity: 150.0,
                },
            ]
        );
    }
}
