use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, error, info};

use lotledger_core::{BatchReceipt, BatchSink, DatabaseConfig, InventoryLineItem, SinkError};
use crate::{InfraError, Result};

/// 16 binds per row keeps a statement well under the 65535 parameter limit
const MAX_ROWS_PER_STATEMENT: usize = 1000;

const COLUMNS: &str = "id, document_id, auction_id, name, description, category, condition, \
    quantity, bid_amount, premium, tax, shipping_cost, total_cost, \
    cost_per_item, acquisition_date, keywords";

#[derive(Debug, Clone)]
pub struct PostgresSinkConfig {
    pub url: String,
    pub table: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
}

impl Default for PostgresSinkConfig {
    fn default() -> Self {
        Self {
            url: String::from("postgres://localhost/lotledger"),
            table: String::from("inventory_line_items"),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PostgresSinkConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn from_database_config(config: &DatabaseConfig, connect_timeout: Duration) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| InfraError::Configuration("database.url is not set".to_string()))?;
        Ok(Self {
            url,
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout,
            ..Default::default()
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// PostgreSQL destination for inventory line items
#[derive(Clone)]
pub struct PostgresSink {
    pool: PgPool,
    table: String,
}

impl PostgresSink {
    pub async fn connect(config: PostgresSinkConfig) -> Result<Self> {
        validate_table_name(&config.table)?;
        info!(table = %config.table, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await?;

        Ok(Self {
            pool,
            table: config.table,
        })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    /// Create the line item table and its document index if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_index_sql(&self.table))
            .execute(&self.pool)
            .await?;
        debug!(table = %self.table, "Schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Replay a failed batch row by row inside a transaction that is always
    /// rolled back, to find the position of the offending item.
    async fn locate_failure(&self, items: &[InventoryLineItem], batch_err: sqlx::Error) -> SinkError {
        let document_id = items.first().map(|i| i.document_id.as_str()).unwrap_or_default();

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return SinkError::Unavailable(e.to_string()),
        };

        let sql = insert_sql(&self.table);
        let mut failure = None;
        for (position, item) in items.iter().enumerate() {
            if let Err(e) = bind_item(sqlx::query(&sql), item).execute(&mut *tx).await {
                failure = Some(SinkError::ItemFailed {
                    position,
                    item_id: item.id,
                    message: e.to_string(),
                });
                break;
            }
        }

        if let Err(rollback_err) = tx.rollback().await {
            error!(error = %rollback_err, "Rollback failed");
        }

        match failure {
            Some(err) => {
                error!(document_id, error = %err, "Insert failed, batch rolled back");
                err
            }
            None => {
                error!(document_id, error = %batch_err, "Batch insert failed, rolled back");
                SinkError::CommitFailed(batch_err.to_string())
            }
        }
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn bind_item<'q>(query: PgQuery<'q>, item: &'q InventoryLineItem) -> PgQuery<'q> {
    query
        .bind(*item.id.as_uuid())
        .bind(&item.document_id)
        .bind(&item.auction_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category.as_str())
        .bind(item.condition.as_str())
        .bind(item.quantity)
        .bind(&item.bid_amount)
        .bind(&item.premium)
        .bind(&item.tax)
        .bind(&item.shipping_cost)
        .bind(&item.total_cost)
        .bind(&item.cost_per_item)
        .bind(item.acquisition_date)
        .bind(&item.keywords)
}

/// One multi-row `INSERT .. ON CONFLICT (id) DO NOTHING` for a chunk of items
fn batch_insert<'q>(table: &str, items: &'q [InventoryLineItem]) -> QueryBuilder<'q, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {table} ({COLUMNS}) "));
    builder.push_values(items, |mut row, item| {
        row.push_bind(*item.id.as_uuid())
            .push_bind(&item.document_id)
            .push_bind(&item.auction_id)
            .push_bind(&item.name)
            .push_bind(&item.description)
            .push_bind(item.category.as_str())
            .push_bind(item.condition.as_str())
            .push_bind(item.quantity)
            .push_bind(&item.bid_amount)
            .push_bind(&item.premium)
            .push_bind(&item.tax)
            .push_bind(&item.shipping_cost)
            .push_bind(&item.total_cost)
            .push_bind(&item.cost_per_item)
            .push_bind(item.acquisition_date)
            .push_bind(&item.keywords);
    });
    builder.push(" ON CONFLICT (id) DO NOTHING");
    builder
}

#[async_trait]
impl BatchSink for PostgresSink {
    async fn health_check(&self) -> std::result::Result<(), SinkError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }

    async fn save_batch(
        &self,
        items: &[InventoryLineItem],
    ) -> std::result::Result<BatchReceipt, SinkError> {
        if items.is_empty() {
            return Ok(BatchReceipt::default());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        let mut inserted = 0u64;
        for chunk in items.chunks(MAX_ROWS_PER_STATEMENT) {
            let result = batch_insert(&self.table, chunk).build().execute(&mut *tx).await;
            match result {
                Ok(done) => inserted += done.rows_affected(),
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        error!(error = %rollback_err, "Rollback failed");
                    }
                    return Err(self.locate_failure(items, e).await);
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| SinkError::CommitFailed(e.to_string()))?;

        let receipt = BatchReceipt {
            inserted: inserted as usize,
            skipped: items.len() - inserted as usize,
        };
        debug!(
            table = %self.table,
            inserted = receipt.inserted,
            skipped = receipt.skipped,
            "Batch committed"
        );

        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(InfraError::Configuration(format!(
            "Invalid table name: {}",
            table
        )))
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id UUID PRIMARY KEY,
            document_id TEXT NOT NULL,
            auction_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'other',
            condition TEXT NOT NULL DEFAULT 'unknown',
            quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
            bid_amount NUMERIC(14, 2) NOT NULL,
            premium NUMERIC(14, 2) NOT NULL,
            tax NUMERIC(14, 2) NOT NULL,
            shipping_cost NUMERIC(14, 2) NOT NULL DEFAULT 0,
            total_cost NUMERIC(14, 2) NOT NULL,
            cost_per_item NUMERIC(14, 2) NOT NULL,
            acquisition_date DATE NOT NULL,
            keywords TEXT[] NOT NULL DEFAULT '{{}}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    )
}

fn create_index_sql(table: &str) -> String {
    let index = table.replace('.', "_");
    format!("CREATE INDEX IF NOT EXISTS {index}_document_id_idx ON {table} (document_id)")
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (id) DO NOTHING"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use lotledger_core::{Category, Condition, LineItemId};

    fn item(ordinal: usize) -> InventoryLineItem {
        let price = BigDecimal::from(25);
        InventoryLineItem {
            id: LineItemId::from_content("INV-9", ordinal, "Brass lamp", &price),
            document_id: "INV-9".to_string(),
            auction_id: "AUC-9".to_string(),
            name: "Brass lamp".to_string(),
            description: "Brass lamp".to_string(),
            category: Category::Lighting,
            condition: Condition::Unknown,
            quantity: 1,
            bid_amount: price.clone(),
            premium: BigDecimal::from(0),
            tax: BigDecimal::from(0),
            shipping_cost: BigDecimal::from(0),
            total_cost: price.clone(),
            cost_per_item: price,
            acquisition_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            keywords: vec!["brass".to_string(), "lamp".to_string()],
        }
    }

    #[test]
    fn test_batch_is_one_statement() {
        let items = vec![item(0), item(1), item(2)];
        let builder = batch_insert("inventory_line_items", &items);
        let sql = builder.sql();

        assert!(sql.starts_with("INSERT INTO inventory_line_items (id, document_id"));
        assert!(sql.ends_with(" ON CONFLICT (id) DO NOTHING"));
        assert_eq!(sql.matches("ON CONFLICT").count(), 1);
        assert!(sql.contains("$48"));
        assert!(!sql.contains("$49"));
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("inventory_line_items").is_ok());
        assert!(validate_table_name("ledger.items").is_ok());
        assert!(validate_table_name("items; DROP TABLE x").is_err());
        assert!(validate_table_name("1items").is_err());
        assert!(validate_table_name("").is_err());
    }

    #[test]
    fn test_insert_is_idempotent_statement() {
        let sql = insert_sql("inventory_line_items");
        assert!(sql.contains("ON CONFLICT (id) DO NOTHING"));
        assert!(sql.contains("$16"));
    }

    #[test]
    fn test_schema_sql_uses_exact_numeric() {
        let sql = create_table_sql("items");
        assert!(sql.contains("bid_amount NUMERIC(14, 2)"));
        assert!(sql.contains("keywords TEXT[] NOT NULL DEFAULT '{}'"));
        assert_eq!(
            create_index_sql("ledger.items"),
            "CREATE INDEX IF NOT EXISTS ledger_items_document_id_idx ON ledger.items (document_id)"
        );
    }

    #[test]
    fn test_config_requires_url() {
        let missing = PostgresSinkConfig::from_database_config(
            &DatabaseConfig::default(),
            Duration::from_secs(1),
        );
        assert!(matches!(missing, Err(InfraError::Configuration(_))));

        let config = PostgresSinkConfig::from_database_config(
            &DatabaseConfig::new("postgres://db/lots".to_string()),
            Duration::from_secs(3),
        )
        .unwrap();
        assert_eq!(config.url, "postgres://db/lots");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.table, "inventory_line_items");
    }
}
