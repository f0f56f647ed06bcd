use parcel_core::{RepositoryError, UniqueField};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Map a sqlx error onto the repository seam, naming the violated unique key.
pub(crate) fn map_db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::DuplicateKey(unique_field(db_err.constraint()));
        }
    }
    RepositoryError::Database(Box::new(err))
}

fn unique_field(constraint: Option<&str>) -> UniqueField {
    match constraint {
        Some("return_orders_order_number_key") => UniqueField::OrderNumber,
        Some("return_orders_tracking_number_key") => UniqueField::TrackingNumber,
        Some("return_orders_gateway_reference_key") => UniqueField::GatewayReference,
        Some("return_receipts_order_id_key") => UniqueField::ReceiptOrder,
        _ => UniqueField::Other,
    }
}
