//! SegmentForge: DBSCAN segmentation of sales data served over HTTP
//!
//! This library clusters customers, products, suppliers and countries from
//! a sales database with DBSCAN, choosing `eps` and `min_samples`
//! automatically from a k-distance elbow and the silhouette score.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod scaling;
pub mod server;
pub mod tuning;
pub mod viz;

// Re-export public items for easier access
pub use analysis::{AnalysisService, Segmentation};
pub use cli::Args;
pub use config::{DatabaseConfig, ServiceConfig};
pub use data::{InMemorySource, PgSalesSource, SalesSource};
pub use error::{AnalysisError, Result};
pub use model::{ClusterLabels, DbscanParams, NOISE};
pub use tuning::MinSamplesRange;
pub use viz::{PngScatterPlot, ScatterPlot, Visualizer};
