use super::{segment, Segmentation};
use crate::data::{into_feature_table, CustomerRow};
use crate::error::Result;
use crate::model::DbscanParams;
use crate::tuning::MinSamplesRange;
use crate::viz::{ScatterPlot, Visualizer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerOutlier {
    pub customer_id: String,
    pub company_name: String,
    pub total_orders: f64,
    pub total_spends: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerCluster {
    pub customer_id: String,
    pub company_name: String,
    pub cluster: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerAnalysis {
    pub total_customers: usize,
    pub number_of_clusters: usize,
    pub outliers_count: usize,
    pub parameters: DbscanParams,
    pub outliers: Vec<CustomerOutlier>,
    pub clusters: Vec<CustomerCluster>,
}

pub(super) fn analyze(
    rows: Vec<CustomerRow>,
    search: MinSamplesRange,
    visualizer: &dyn Visualizer,
) -> Result<CustomerAnalysis> {
    let table = into_feature_table(rows, "customer")?;
    let Segmentation { params, labels } = segment(&table.features, search)?;

    visualizer.render(&ScatterPlot {
        title: ScatterPlot::title_for("Customer Segmentation", &params),
        x_label: "Total Orders".to_string(),
        y_label: "Total Spending".to_string(),
        points: table.column_pairs("total_orders", "total_spends"),
        labels: labels.as_slice().to_vec(),
    })?;

    // columns: total_orders, total_spends, avg_order_value
    let outliers = labels
        .outlier_indices()
        .into_iter()
        .map(|i| {
            let row = &table.rows[i];
            CustomerOutlier {
                customer_id: row.customer_id.clone(),
                company_name: row.company_name.clone(),
                total_orders: table.features[[i, 0]],
                total_spends: table.features[[i, 1]],
            }
        })
        .collect();

    let clusters = table
        .rows
        .iter()
        .zip(labels.as_slice())
        .map(|(row, &cluster)| CustomerCluster {
            customer_id: row.customer_id.clone(),
            company_name: row.company_name.clone(),
            cluster,
        })
        .collect();

    Ok(CustomerAnalysis {
        total_customers: table.len(),
        number_of_clusters: labels.n_clusters(),
        outliers_count: labels.outlier_count(),
        parameters: params,
        outliers,
        clusters,
    })
}
