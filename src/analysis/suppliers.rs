use super::{segment, Segmentation};
use crate::data::{into_feature_table, SupplierRow};
use crate::error::Result;
use crate::model::DbscanParams;
use crate::tuning::MinSamplesRange;
use crate::viz::{ScatterPlot, Visualizer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierOutlier {
    pub supplier_id: i32,
    pub supplied_products_count: f64,
    pub total_sales_quantity: f64,
    pub average_sale_price: f64,
    pub average_customer_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierCluster {
    pub supplier_id: i32,
    pub cluster: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierAnalysis {
    pub total_suppliers: usize,
    pub number_of_clusters: usize,
    pub outliers_count: usize,
    pub parameters: DbscanParams,
    pub outliers: Vec<SupplierOutlier>,
    pub clusters: Vec<SupplierCluster>,
}

pub(super) fn analyze(
    rows: Vec<SupplierRow>,
    search: MinSamplesRange,
    visualizer: &dyn Visualizer,
) -> Result<SupplierAnalysis> {
    let table = into_feature_table(rows, "supplier")?;
    let Segmentation { params, labels } = segment(&table.features, search)?;

    visualizer.render(&ScatterPlot {
        title: ScatterPlot::title_for("Supplier Segmentation", &params),
        x_label: "Supplied Products Count".to_string(),
        y_label: "Total Sales Quantity".to_string(),
        points: table.column_pairs("supplied_products_count", "total_sales_quantity"),
        labels: labels.as_slice().to_vec(),
    })?;

    let outliers = labels
        .outlier_indices()
        .into_iter()
        .map(|i| {
            let features = table.features.row(i);
            SupplierOutlier {
                supplier_id: table.rows[i].supplier_id,
                supplied_products_count: features[0],
                total_sales_quantity: features[1],
                average_sale_price: features[2],
                average_customer_count: features[3],
            }
        })
        .collect();

    let clusters = table
        .rows
        .iter()
        .zip(labels.as_slice())
        .map(|(row, &cluster)| SupplierCluster {
            supplier_id: row.supplier_id,
            cluster,
        })
        .collect();

    Ok(SupplierAnalysis {
        total_suppliers: table.len(),
        number_of_clusters: labels.n_clusters(),
        outliers_count: labels.outlier_count(),
        parameters: params,
        outliers,
        clusters,
    })
}
