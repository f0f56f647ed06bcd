pub mod app_config;
pub mod database;
pub mod memory;
pub mod order_repo;
pub mod receipt_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use memory::InMemoryStore;
pub use order_repo::PgOrderRepository;
pub use receipt_repo::PgReceiptRepository;
pub use redis_repo::RedisClient;
