//! Segmentation pipelines for customers, products, suppliers and countries
//!
//! Every pipeline runs the same core: clean the fetched rows, standardize
//! the features, search DBSCAN parameters, cluster once with the winner,
//! render a scatter plot and summarize outliers and clusters.

mod countries;
mod customers;
mod products;
mod suppliers;

pub use countries::{CountryAnalysis, CountryCluster, CountryOutlier};
pub use customers::{CustomerAnalysis, CustomerCluster, CustomerOutlier};
pub use products::{ClusterStatistics, ProductAnalysis, ProductCluster, ProductOutlier};
pub use suppliers::{SupplierAnalysis, SupplierCluster, SupplierOutlier};

use crate::data::SalesSource;
use crate::error::{AnalysisError, Result};
use crate::model::{self, ClusterLabels, DbscanParams};
use crate::scaling::standardize;
use crate::tuning::{select_parameters, MinSamplesRange};
use crate::viz::Visualizer;
use ndarray::Array2;
use std::sync::Arc;
use tracing::{error, info};

/// Chosen parameters and the labels they produced
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub params: DbscanParams,
    pub labels: ClusterLabels,
}

/// Standardize a raw feature matrix, pick parameters and cluster it
pub fn segment(features: &Array2<f64>, search: MinSamplesRange) -> Result<Segmentation> {
    info!("Standardizing {} features", features.ncols());
    let scaled = standardize(features)?;

    let params = select_parameters(&scaled, search)?;

    info!("Applying DBSCAN clustering");
    let labels = model::cluster(&scaled, params)?;
    info!(
        "Found {} clusters and {} outliers",
        labels.n_clusters(),
        labels.outlier_count()
    );

    Ok(Segmentation { params, labels })
}

type Pipeline<R, T> = fn(Vec<R>, MinSamplesRange, &dyn Visualizer) -> Result<T>;

/// Runs the four pipelines against a sales source
///
/// The source query is the only await point; everything after it runs on
/// the blocking pool and owns its data.
pub struct AnalysisService<S, V> {
    source: S,
    visualizer: Arc<V>,
    search: MinSamplesRange,
}

impl<S, V> AnalysisService<S, V>
where
    S: SalesSource,
    V: Visualizer + 'static,
{
    pub fn new(source: S, visualizer: V, search: MinSamplesRange) -> Self {
        Self {
            source,
            visualizer: Arc::new(visualizer),
            search,
        }
    }

    pub async fn customers(&self) -> Result<CustomerAnalysis> {
        let rows = self.source.customers().await;
        self.run("customer", rows, customers::analyze).await
    }

    pub async fn products(&self) -> Result<ProductAnalysis> {
        let rows = self.source.products().await;
        self.run("product", rows, products::analyze).await
    }

    pub async fn suppliers(&self) -> Result<SupplierAnalysis> {
        let rows = self.source.suppliers().await;
        self.run("supplier", rows, suppliers::analyze).await
    }

    pub async fn countries(&self) -> Result<CountryAnalysis> {
        let rows = self.source.countries().await;
        self.run("country", rows, countries::analyze).await
    }

    async fn run<R, T>(
        &self,
        entity: &'static str,
        rows: Result<Vec<R>>,
        pipeline: Pipeline<R, T>,
    ) -> Result<T>
    where
        R: Send + 'static,
        T: Send + 'static,
    {
        info!("Starting {} analysis", entity);

        let outcome = match rows {
            Ok(rows) => {
                info!("Retrieved {} {} rows from database", rows.len(), entity);
                let visualizer = Arc::clone(&self.visualizer);
                let search = self.search;
                tokio::task::spawn_blocking(move || pipeline(rows, search, visualizer.as_ref()))
                    .await
                    .map_err(AnalysisError::from)
                    .and_then(|result| result)
            }
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(_) => info!("{} analysis completed successfully", entity),
            Err(err) => error!("Error in {} analysis: {}", entity, err),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountryRow, CustomerRow, InMemorySource, ProductRow, SupplierRow};
    use crate::model::NOISE;
    use crate::viz::ScatterPlot;
    use std::sync::Mutex;

    /// Remembers every plot it was asked to draw
    #[derive(Default)]
    struct RecordingVisualizer {
        plots: Mutex<Vec<ScatterPlot>>,
    }

    impl Visualizer for RecordingVisualizer {
        fn render(&self, plot: &ScatterPlot) -> Result<String> {
            self.plots.lock().unwrap().push(plot.clone());
            Ok("cGxvdA==".to_string())
        }
    }

    struct FailingVisualizer;

    impl Visualizer for FailingVisualizer {
        fn render(&self, _plot: &ScatterPlot) -> Result<String> {
            Err(AnalysisError::Visualization("no backend".to_string()))
        }
    }

    fn grouped_values() -> Vec<[f64; 3]> {
        let base = [
            [0.0, 0.0, 0.0],
            [0.3, 0.0, 0.1],
            [0.0, 0.2, 0.0],
            [0.1, 0.1, 0.4],
            [0.2, 0.4, 0.2],
        ];
        let mut values = base.to_vec();
        values.extend(base.iter().map(|r| [r[0] + 10.0, r[1] + 10.0, r[2] + 10.0]));
        values
    }

    fn customers() -> Vec<CustomerRow> {
        grouped_values()
            .into_iter()
            .enumerate()
            .map(|(i, v)| CustomerRow {
                customer_id: format!("C{:03}", i),
                company_name: format!("Company {}", i),
                total_orders: Some(v[0]),
                total_spends: Some(v[1]),
                avg_order_value: Some(v[2]),
            })
            .collect()
    }

    fn products() -> Vec<ProductRow> {
        let mut rows: Vec<ProductRow> = grouped_values()
            .into_iter()
            .enumerate()
            .map(|(i, v)| ProductRow {
                product_id: i as i32 + 1,
                product_name: format!("Product {}", i + 1),
                average_sale_price: Some(v[0]),
                total_quantity_sold: Some(v[1]),
                average_quantity_per_order: Some(v[2]),
                unique_customers: Some(v[0] + v[1]),
            })
            .collect();
        rows.push(ProductRow {
            product_id: 99,
            product_name: "Discontinued".to_string(),
            average_sale_price: None,
            total_quantity_sold: Some(1.0),
            average_quantity_per_order: Some(1.0),
            unique_customers: Some(1.0),
        });
        rows
    }

    fn suppliers() -> Vec<SupplierRow> {
        grouped_values()
            .into_iter()
            .enumerate()
            .map(|(i, v)| SupplierRow {
                supplier_id: i as i32 + 1,
                supplied_products_count: Some(v[0]),
                total_sales_quantity: Some(v[1]),
                average_sale_price: Some(v[2]),
                average_customer_count: Some(v[0] - v[2]),
            })
            .collect()
    }

    fn countries() -> Vec<CountryRow> {
        grouped_values()
            .into_iter()
            .enumerate()
            .map(|(i, v)| CountryRow {
                country: format!("Country {}", i),
                total_orders: Some(v[0]),
                average_order_amount: Some(v[1]),
                products_per_order: Some(v[2]),
            })
            .collect()
    }

    fn service(source: InMemorySource) -> AnalysisService<InMemorySource, RecordingVisualizer> {
        AnalysisService::new(
            source,
            RecordingVisualizer::default(),
            MinSamplesRange::default(),
        )
    }

    #[test]
    fn test_segment_two_groups() {
        let features = Array2::from_shape_vec(
            (10, 3),
            grouped_values().into_iter().flatten().collect(),
        )
        .unwrap();

        let segmentation = segment(&features, MinSamplesRange::default()).unwrap();
        assert_eq!(segmentation.labels.len(), 10);
        assert_eq!(segmentation.labels.n_clusters(), 2);
        assert_eq!(segmentation.labels.outlier_count(), 0);
    }

    #[tokio::test]
    async fn test_customer_pipeline() {
        let service = service(InMemorySource {
            customers: customers(),
            ..Default::default()
        });

        let result = service.customers().await.unwrap();
        assert_eq!(result.total_customers, 10);
        assert_eq!(result.number_of_clusters, 2);
        assert_eq!(result.outliers_count, 0);
        assert!(result.outliers.is_empty());
        assert_eq!(result.clusters.len(), 10);
        assert_eq!(result.clusters[0].customer_id, "C000");

        let plots = service.visualizer.plots.lock().unwrap();
        assert_eq!(plots.len(), 1);
        assert!(plots[0].title.starts_with("Customer Segmentation (DBSCAN) - eps="));
        assert_eq!(plots[0].x_label, "Total Orders");
        assert_eq!(plots[0].points[5], (10.0, 10.0));
    }

    #[tokio::test]
    async fn test_product_pipeline_drops_incomplete_rows_and_keeps_plot() {
        let service = service(InMemorySource {
            products: products(),
            ..Default::default()
        });

        let result = service.products().await.unwrap();
        assert_eq!(result.total_products, 10);
        assert_eq!(result.number_of_clusters, 2);
        assert_eq!(result.plot, "cGxvdA==");
        assert!(result.clusters.iter().all(|c| c.product_id != 99));

        assert_eq!(result.cluster_statistics.len(), 2);
        let first = &result.cluster_statistics[0];
        assert_eq!(first.cluster, 0);
        assert_eq!(first.product_count, 5);
        assert!((first.average_price - 0.12).abs() < 1e-9);
        assert!((first.total_quantity - 0.7).abs() < 1e-9);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("plot").is_none());
        assert!(json.get("cluster_statistics").is_some());
    }

    #[tokio::test]
    async fn test_supplier_and_country_pipelines() {
        let service = service(InMemorySource {
            suppliers: suppliers(),
            countries: countries(),
            ..Default::default()
        });

        let suppliers = service.suppliers().await.unwrap();
        assert_eq!(suppliers.total_suppliers, 10);
        assert_eq!(suppliers.number_of_clusters, 2);

        let countries = service.countries().await.unwrap();
        assert_eq!(countries.total_countries, 10);
        assert_eq!(countries.clusters.len(), 10);

        let plots = service.visualizer.plots.lock().unwrap();
        assert_eq!(plots.len(), 2);
        assert!(plots[1]
            .title
            .starts_with("Country Sales Pattern Analysis (DBSCAN)"));
    }

    #[tokio::test]
    async fn test_far_outlier_is_reported() {
        let mut rows = vec![
            [10.0, 20.0, 30.0],
            [12.0, 21.0, 29.0],
            [11.0, 19.0, 31.0],
            [9.0, 22.0, 30.0],
            [10.0, 20.0, 32.0],
            [1000.0, 1000.0, 1000.0],
        ]
        .into_iter()
        .enumerate()
        .map(|(i, v)| CountryRow {
            country: format!("Country {}", i),
            total_orders: Some(v[0]),
            average_order_amount: Some(v[1]),
            products_per_order: Some(v[2]),
        })
        .collect::<Vec<_>>();
        rows[5].country = "Atlantis".to_string();

        let service = service(InMemorySource {
            countries: rows,
            ..Default::default()
        });

        let result = service.countries().await.unwrap();
        assert_eq!(result.outliers_count, 1);
        assert_eq!(result.outliers[0].country, "Atlantis");
        assert_eq!(result.outliers[0].total_orders, 1000.0);
        assert_eq!(result.clusters[5].cluster, NOISE);
        assert_eq!(result.number_of_clusters, 1);
    }

    #[tokio::test]
    async fn test_empty_tables_are_no_data() {
        let service = service(InMemorySource::default());

        assert!(matches!(
            service.customers().await,
            Err(AnalysisError::NoData(_))
        ));
        assert!(matches!(
            service.products().await,
            Err(AnalysisError::NoData(_))
        ));
        assert!(matches!(
            service.suppliers().await,
            Err(AnalysisError::NoData(_))
        ));
        assert!(matches!(
            service.countries().await,
            Err(AnalysisError::NoData(_))
        ));
        assert!(service.visualizer.plots.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_visualization_failure_fails_the_request() {
        let service = AnalysisService::new(
            InMemorySource {
                customers: customers(),
                ..Default::default()
            },
            FailingVisualizer,
            MinSamplesRange::default(),
        );

        assert!(matches!(
            service.customers().await,
            Err(AnalysisError::Visualization(_))
        ));
    }
}
