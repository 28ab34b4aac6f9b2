//! Sales data access and numeric feature preparation
//!
//! Each entity query produces one row per entity with a handful of
//! aggregate columns. Aggregates may be NULL, so feature values stay
//! optional until [`into_feature_table`] drops incomplete rows.

use crate::config::DatabaseConfig;
use crate::error::{AnalysisError, Result};
use crate::scaling::feature_matrix;
use async_trait::async_trait;
use deadpool_postgres::{ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use ndarray::Array2;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info, warn};

const CUSTOMERS_QUERY: &str = "
    SELECT
        c.customer_id::TEXT AS customer_id,
        c.company_name::TEXT AS company_name,
        COUNT(o.order_id)::DOUBLE PRECISION AS total_orders,
        SUM(od.unit_price * od.quantity * (1 - od.discount))::DOUBLE PRECISION AS total_spends,
        AVG(od.unit_price * od.quantity)::DOUBLE PRECISION AS avg_order_value
    FROM customers c
    INNER JOIN orders o ON c.customer_id = o.customer_id
    INNER JOIN order_details od ON o.order_id = od.order_id
    GROUP BY c.customer_id, c.company_name
    HAVING COUNT(o.order_id) > 0";

const PRODUCTS_QUERY: &str = "
    SELECT
        p.product_id::INTEGER AS product_id,
        p.product_name::TEXT AS product_name,
        AVG(od.unit_price)::DOUBLE PRECISION AS average_sale_price,
        SUM(od.quantity)::DOUBLE PRECISION AS total_quantity_sold,
        AVG(od.quantity)::DOUBLE PRECISION AS average_quantity_per_order,
        COUNT(DISTINCT o.customer_id)::DOUBLE PRECISION AS unique_customers
    FROM products p
    JOIN order_details od ON p.product_id = od.product_id
    JOIN orders o ON od.order_id = o.order_id
    GROUP BY p.product_id, p.product_name
    ORDER BY p.product_id";

const SUPPLIERS_QUERY: &str = "
    SELECT
        s.supplier_id::INTEGER AS supplier_id,
        COUNT(p.product_id)::DOUBLE PRECISION AS supplied_products_count,
        SUM(od.quantity)::DOUBLE PRECISION AS total_sales_quantity,
        AVG(od.unit_price)::DOUBLE PRECISION AS average_sale_price,
        AVG(sub.customer_count)::DOUBLE PRECISION AS average_customer_count
    FROM suppliers s
    INNER JOIN products p ON p.supplier_id = s.supplier_id
    INNER JOIN order_details od ON p.product_id = od.product_id
    INNER JOIN orders o ON o.order_id = od.order_id
    INNER JOIN (
        SELECT
            p.product_id,
            COUNT(o.customer_id) AS customer_count
        FROM products p
        INNER JOIN order_details od ON p.product_id = od.product_id
        INNER JOIN orders o ON od.order_id = o.order_id
        GROUP BY p.product_id
    ) sub ON p.product_id = sub.product_id
    GROUP BY s.supplier_id
    HAVING COUNT(p.product_id) > 0";

const COUNTRIES_QUERY: &str = "
    SELECT
        c.country::TEXT AS country,
        COUNT(o.order_id)::DOUBLE PRECISION AS total_orders,
        AVG(sub.order_amount)::DOUBLE PRECISION AS average_order_amount,
        AVG(sub.product_quantity)::DOUBLE PRECISION AS products_per_order
    FROM customers c
    JOIN orders o ON c.customer_id = o.customer_id
    JOIN (
        SELECT
            od.order_id,
            SUM(od.unit_price * od.quantity) AS order_amount,
            SUM(od.quantity) AS product_quantity
        FROM order_details od
        GROUP BY od.order_id
    ) sub ON o.order_id = sub.order_id
    GROUP BY c.country
    HAVING COUNT(o.order_id) > 0";

/// A query row that carries numeric feature columns
pub trait FeatureRow {
    /// Names of the feature columns, in matrix column order
    const FEATURES: &'static [&'static str];

    /// Feature values in `FEATURES` order; `None` marks SQL NULL
    fn feature_values(&self) -> Vec<Option<f64>>;

    /// All feature values, or `None` if any is missing or non-finite
    fn complete_features(&self) -> Option<Vec<f64>> {
        self.feature_values()
            .into_iter()
            .map(|value| value.filter(|v| v.is_finite()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRow {
    pub customer_id: String,
    pub company_name: String,
    pub total_orders: Option<f64>,
    pub total_spends: Option<f64>,
    pub avg_order_value: Option<f64>,
}

impl FeatureRow for CustomerRow {
    const FEATURES: &'static [&'static str] = &["total_orders", "total_spends", "avg_order_value"];

    fn feature_values(&self) -> Vec<Option<f64>> {
        vec![self.total_orders, self.total_spends, self.avg_order_value]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub product_id: i32,
    pub product_name: String,
    pub average_sale_price: Option<f64>,
    pub total_quantity_sold: Option<f64>,
    pub average_quantity_per_order: Option<f64>,
    pub unique_customers: Option<f64>,
}

impl FeatureRow for ProductRow {
    const FEATURES: &'static [&'static str] = &[
        "average_sale_price",
        "total_quantity_sold",
        "average_quantity_per_order",
        "unique_customers",
    ];

    fn feature_values(&self) -> Vec<Option<f64>> {
        vec![
            self.average_sale_price,
            self.total_quantity_sold,
            self.average_quantity_per_order,
            self.unique_customers,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplierRow {
    pub supplier_id: i32,
    pub supplied_products_count: Option<f64>,
    pub total_sales_quantity: Option<f64>,
    pub average_sale_price: Option<f64>,
    pub average_customer_count: Option<f64>,
}

impl FeatureRow for SupplierRow {
    const FEATURES: &'static [&'static str] = &[
        "supplied_products_count",
        "total_sales_quantity",
        "average_sale_price",
        "average_customer_count",
    ];

    fn feature_values(&self) -> Vec<Option<f64>> {
        vec![
            self.supplied_products_count,
            self.total_sales_quantity,
            self.average_sale_price,
            self.average_customer_count,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryRow {
    pub country: String,
    pub total_orders: Option<f64>,
    pub average_order_amount: Option<f64>,
    pub products_per_order: Option<f64>,
}

impl FeatureRow for CountryRow {
    const FEATURES: &'static [&'static str] =
        &["total_orders", "average_order_amount", "products_per_order"];

    fn feature_values(&self) -> Vec<Option<f64>> {
        vec![
            self.total_orders,
            self.average_order_amount,
            self.products_per_order,
        ]
    }
}

/// Cleaned rows together with their raw (unscaled) feature matrix
///
/// Row `i` of `features` belongs to `rows[i]`.
#[derive(Debug, Clone)]
pub struct FeatureTable<R> {
    pub rows: Vec<R>,
    pub features: Array2<f64>,
}

impl<R: FeatureRow> FeatureTable<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw value of a named feature column for one row
    pub fn value(&self, row: usize, feature: &str) -> Option<f64> {
        let column = R::FEATURES.iter().position(|&name| name == feature)?;
        self.features.get((row, column)).copied()
    }

    /// `(x, y)` pairs of two named feature columns, one per row
    pub fn column_pairs(&self, x: &str, y: &str) -> Vec<(f64, f64)> {
        (0..self.len())
            .filter_map(|i| Some((self.value(i, x)?, self.value(i, y)?)))
            .collect()
    }
}

/// Drop rows with missing feature values and build the feature matrix
///
/// # Arguments
/// * `rows` - Rows as returned by the data source
/// * `entity` - Table name used in error messages ("customer", "product", ...)
///
/// # Returns
/// The complete rows together with their raw feature matrix
pub fn into_feature_table<R: FeatureRow>(rows: Vec<R>, entity: &str) -> Result<FeatureTable<R>> {
    if rows.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "No {} data found in the database",
            entity
        )));
    }

    let fetched = rows.len();
    let mut kept = Vec::with_capacity(fetched);
    let mut values = Vec::with_capacity(fetched);
    for row in rows {
        if let Some(features) = row.complete_features() {
            values.push(features);
            kept.push(row);
        }
    }

    if kept.is_empty() {
        return Err(AnalysisError::NoData(
            "No valid numeric data found after cleaning".to_string(),
        ));
    }
    if kept.len() < fetched {
        warn!(
            "Dropped {} {} rows with missing values",
            fetched - kept.len(),
            entity
        );
    }

    let features = feature_matrix(&values)?;
    Ok(FeatureTable {
        rows: kept,
        features,
    })
}

/// Source of the per-entity aggregate tables
#[async_trait]
pub trait SalesSource: Send + Sync {
    async fn customers(&self) -> Result<Vec<CustomerRow>>;
    async fn products(&self) -> Result<Vec<ProductRow>>;
    async fn suppliers(&self) -> Result<Vec<SupplierRow>>;
    async fn countries(&self) -> Result<Vec<CountryRow>>;
}

/// PostgreSQL-backed sales source using a connection pool
#[derive(Clone)]
pub struct PgSalesSource {
    pool: Pool,
}

impl PgSalesSource {
    /// Build the pool; connections are opened lazily on first use
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg = deadpool_postgres::Config::new();
        pg.host = Some(config.host.clone());
        pg.port = Some(config.port);
        pg.user = Some(config.user.clone());
        pg.password = config.password.clone();
        pg.dbname = Some(config.dbname.clone());
        pg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        pg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AnalysisError::DataSource(format!("failed to create pool: {}", e)))?;

        info!("Database pool configured for {}", config.redacted_url());
        Ok(Self { pool })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Row>> {
        let client = self.pool.get().await?;
        let rows = client.query(query, &[]).await?;
        debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

#[async_trait]
impl SalesSource for PgSalesSource {
    async fn customers(&self) -> Result<Vec<CustomerRow>> {
        self.fetch(CUSTOMERS_QUERY)
            .await?
            .iter()
            .map(|row| -> Result<CustomerRow> {
                Ok(CustomerRow {
                    customer_id: row.try_get("customer_id")?,
                    company_name: row.try_get("company_name")?,
                    total_orders: row.try_get("total_orders")?,
                    total_spends: row.try_get("total_spends")?,
                    avg_order_value: row.try_get("avg_order_value")?,
                })
            })
            .collect()
    }

    async fn products(&self) -> Result<Vec<ProductRow>> {
        self.fetch(PRODUCTS_QUERY)
            .await?
            .iter()
            .map(|row| -> Result<ProductRow> {
                Ok(ProductRow {
                    product_id: row.try_get("product_id")?,
                    product_name: row.try_get("product_name")?,
                    average_sale_price: row.try_get("average_sale_price")?,
                    total_quantity_sold: row.try_get("total_quantity_sold")?,
                    average_quantity_per_order: row.try_get("average_quantity_per_order")?,
                    unique_customers: row.try_get("unique_customers")?,
                })
            })
            .collect()
    }

    async fn suppliers(&self) -> Result<Vec<SupplierRow>> {
        self.fetch(SUPPLIERS_QUERY)
            .await?
            .iter()
            .map(|row| -> Result<SupplierRow> {
                Ok(SupplierRow {
                    supplier_id: row.try_get("supplier_id")?,
                    supplied_products_count: row.try_get("supplied_products_count")?,
                    total_sales_quantity: row.try_get("total_sales_quantity")?,
                    average_sale_price: row.try_get("average_sale_price")?,
                    average_customer_count: row.try_get("average_customer_count")?,
                })
            })
            .collect()
    }

    async fn countries(&self) -> Result<Vec<CountryRow>> {
        self.fetch(COUNTRIES_QUERY)
            .await?
            .iter()
            .map(|row| -> Result<CountryRow> {
                Ok(CountryRow {
                    country: row.try_get("country")?,
                    total_orders: row.try_get("total_orders")?,
                    average_order_amount: row.try_get("average_order_amount")?,
                    products_per_order: row.try_get("products_per_order")?,
                })
            })
            .collect()
    }
}

/// Fixed tables held in memory, for demos and tests
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub customers: Vec<CustomerRow>,
    pub products: Vec<ProductRow>,
    pub suppliers: Vec<SupplierRow>,
    pub countries: Vec<CountryRow>,
}

#[async_trait]
impl SalesSource for InMemorySource {
    async fn customers(&self) -> Result<Vec<CustomerRow>> {
        Ok(self.customers.clone())
    }

    async fn products(&self) -> Result<Vec<ProductRow>> {
        Ok(self.products.clone())
    }

    async fn suppliers(&self) -> Result<Vec<SupplierRow>> {
        Ok(self.suppliers.clone())
    }

    async fn countries(&self) -> Result<Vec<CountryRow>> {
        Ok(self.countries.clone())
    }
}
