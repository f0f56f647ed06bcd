use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcel_core::repository::RepositoryResult;
use parcel_core::{Receipt, ReceiptRepository};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_db_error;

pub struct PgReceiptRepository {
    pool: PgPool,
}

impl PgReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    owner_id: String,
    order_id: Uuid,
    generated_at: DateTime<Utc>,
    receipt_url: Option<String>,
}

impl From<ReceiptRow> for Receipt {
    fn from(row: ReceiptRow) -> Self {
        Receipt {
            id: row.id,
            owner_id: row.owner_id,
            order_id: row.order_id,
            generated_at: row.generated_at,
            receipt_url: row.receipt_url,
        }
    }
}

#[async_trait]
impl ReceiptRepository for PgReceiptRepository {
    async fn create_receipt(&self, receipt: &Receipt) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO return_receipts (id, owner_id, order_id, generated_at, receipt_url)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(receipt.id)
        .bind(&receipt.owner_id)
        .bind(receipt.order_id)
        .bind(receipt.generated_at)
        .bind(receipt.receipt_url.as_deref())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn receipt_for_order(&self, order_id: Uuid) -> RepositoryResult<Option<Receipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            "SELECT id, owner_id, order_id, generated_at, receipt_url FROM return_receipts WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(row.map(Receipt::from))
    }

    async fn get_receipt(&self, id: Uuid, owner_id: &str) -> RepositoryResult<Option<Receipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            "SELECT id, owner_id, order_id, generated_at, receipt_url FROM return_receipts WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(row.map(Receipt::from))
    }

    async fn list_receipts(&self, owner_id: &str) -> RepositoryResult<Vec<Receipt>> {
        let rows: Vec<ReceiptRow> = sqlx::query_as(
            "SELECT id, owner_id, order_id, generated_at, receipt_url FROM return_receipts \
             WHERE owner_id = $1 ORDER BY generated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(Receipt::from).collect())
    }
}
