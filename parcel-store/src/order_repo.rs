use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcel_core::repository::RepositoryResult;
use parcel_core::{
    Masked, OrderMetadata, OrderRepository, OrderStatus, Package, PaymentInfo, PaymentStatus,
    PickupAddress, RepositoryError, ReturnOrder, Schedule, StatusChange, StatusHistoryEntry,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_db_error;

const ORDER_COLUMNS: &str = "id, owner_id, pickup_address, packages, schedule, \
    payment_method, payment_amount, payment_currency, payment_status, gateway_reference, paid_at, \
    status, status_history, order_number, tracking_number, pickup_pin, created_at, updated_at";

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    owner_id: String,
    pickup_address: Json<PickupAddress>,
    packages: Json<Vec<Package>>,
    schedule: Json<Schedule>,
    payment_method: String,
    payment_amount: i64,
    payment_currency: String,
    payment_status: String,
    gateway_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    status: String,
    status_history: Json<Vec<StatusHistoryEntry>>,
    order_number: String,
    tracking_number: String,
    pickup_pin: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for ReturnOrder {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt =
            |e: &dyn std::fmt::Display| RepositoryError::Corrupt(format!("order {}: {}", id, e));

        let method = row.payment_method.parse().map_err(|e| corrupt(&e))?;
        let currency = row.payment_currency.parse().map_err(|e| corrupt(&e))?;
        let payment_status = row.payment_status.parse().map_err(|e| corrupt(&e))?;
        let status = row.status.parse().map_err(|e| corrupt(&e))?;

        Ok(ReturnOrder {
            id: row.id,
            owner_id: row.owner_id,
            pickup_address: row.pickup_address.0,
            packages: row.packages.0,
            schedule: row.schedule.0,
            payment: PaymentInfo {
                method,
                amount: row.payment_amount,
                currency,
                status: payment_status,
                gateway_reference: row.gateway_reference,
                paid_at: row.paid_at,
            },
            status,
            status_history: row.status_history.0,
            metadata: OrderMetadata {
                order_number: row.order_number,
                tracking_number: row.tracking_number,
                pickup_pin: Masked(row.pickup_pin),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_order(row: Option<OrderRow>) -> RepositoryResult<Option<ReturnOrder>> {
    row.map(ReturnOrder::try_from).transpose()
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &ReturnOrder) -> RepositoryResult<()> {
        let sql = format!(
            "INSERT INTO return_orders ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            ORDER_COLUMNS
        );

        sqlx::query(&sql)
            .bind(order.id)
            .bind(&order.owner_id)
            .bind(Json(&order.pickup_address))
            .bind(Json(&order.packages))
            .bind(Json(&order.schedule))
            .bind(order.payment.method.as_str())
            .bind(order.payment.amount)
            .bind(order.payment.currency.as_str())
            .bind(order.payment.status.as_str())
            .bind(order.payment.gateway_reference.as_deref())
            .bind(order.payment.paid_at)
            .bind(order.status.as_str())
            .bind(Json(&order.status_history))
            .bind(&order.metadata.order_number)
            .bind(&order.metadata.tracking_number)
            .bind(order.metadata.pickup_pin.expose())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Option<ReturnOrder>> {
        let sql = format!("SELECT {} FROM return_orders WHERE id = $1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_order(row)
    }

    async fn find_for_owner(
        &self,
        owner_id: &str,
        identifier: &str,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let by_id = Uuid::parse_str(identifier).ok();
        let sql = format!(
            "SELECT {} FROM return_orders \
             WHERE owner_id = $1 AND (order_number = $2 OR id = $3)",
            ORDER_COLUMNS
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(identifier)
            .bind(by_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_order(row)
    }

    async fn find_by_gateway_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let sql = format!(
            "SELECT {} FROM return_orders WHERE gateway_reference = $1 LIMIT 1",
            ORDER_COLUMNS
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_order(row)
    }

    async fn list_orders(&self, owner_id: &str) -> RepositoryResult<Vec<ReturnOrder>> {
        let sql = format!(
            "SELECT {} FROM return_orders WHERE owner_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(ReturnOrder::try_from).collect()
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        // Compare-and-set on status; the history append rides in the same statement
        let sql = format!(
            "UPDATE return_orders SET \
                status = $3, \
                status_history = status_history || $4, \
                payment_status = COALESCE($5, payment_status), \
                paid_at = COALESCE($6, paid_at), \
                updated_at = $7 \
             WHERE id = $1 AND status = $2 \
             RETURNING {}",
            ORDER_COLUMNS
        );

        let settlement_status = change.settlement.as_ref().map(|s| s.status.as_str());
        let settlement_paid_at = change.settlement.as_ref().map(|s| s.paid_at);

        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(change.status.as_str())
            .bind(Json(vec![&change.entry]))
            .bind(settlement_status)
            .bind(settlement_paid_at)
            .bind(change.entry.changed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_order(row)
    }

    async fn attach_payment(
        &self,
        id: Uuid,
        reference: &str,
        status: PaymentStatus,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let sql = format!(
            "UPDATE return_orders SET gateway_reference = $2, payment_status = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(reference)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_order(row)
    }

    async fn update_payment_status(
        &self,
        reference: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let sql = format!(
            "UPDATE return_orders SET payment_status = $2, paid_at = COALESCE($3, paid_at), updated_at = NOW() \
             WHERE gateway_reference = $1 AND payment_status NOT IN ('completed', 'refunded') \
             RETURNING {}",
            ORDER_COLUMNS
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(reference)
            .bind(status.as_str())
            .bind(paid_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_order(row)
    }
}
