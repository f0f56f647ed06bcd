use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcel_core::repository::RepositoryResult;
use parcel_core::{
    OrderRepository, OrderStatus, PaymentStatus, Receipt, ReceiptRepository, RepositoryError,
    ReturnOrder, StatusChange, UniqueField,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local order and receipt store with the same uniqueness rules as Postgres.
///
/// Every mutation runs under the write lock, so compare-and-set transitions
/// are atomic with respect to concurrent requests.
#[derive(Default)]
pub struct InMemoryStore {
    orders: RwLock<HashMap<Uuid, ReturnOrder>>,
    receipts: RwLock<HashMap<Uuid, Receipt>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn receipt_count(&self) -> usize {
        self.receipts.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &ReturnOrder) -> RepositoryResult<()> {
        let mut orders = self.orders.write().await;

        if orders.contains_key(&order.id) {
            return Err(RepositoryError::DuplicateKey(UniqueField::Other));
        }
        for existing in orders.values() {
            if existing.metadata.order_number == order.metadata.order_number {
                return Err(RepositoryError::DuplicateKey(UniqueField::OrderNumber));
            }
            if existing.metadata.tracking_number == order.metadata.tracking_number {
                return Err(RepositoryError::DuplicateKey(UniqueField::TrackingNumber));
            }
            if order.payment.gateway_reference.is_some()
                && existing.payment.gateway_reference == order.payment.gateway_reference
            {
                return Err(RepositoryError::DuplicateKey(UniqueField::GatewayReference));
            }
        }

        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Option<ReturnOrder>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_for_owner(
        &self,
        owner_id: &str,
        identifier: &str,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let by_id = Uuid::parse_str(identifier).ok();
        let orders = self.orders.read().await;

        Ok(orders
            .values()
            .find(|o| {
                o.owner_id == owner_id
                    && (o.metadata.order_number == identifier || Some(o.id) == by_id)
            })
            .cloned())
    }

    async fn find_by_gateway_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .find(|o| o.payment.gateway_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn list_orders(&self, owner_id: &str) -> RepositoryResult<Vec<ReturnOrder>> {
        let orders = self.orders.read().await;
        let mut owned: Vec<ReturnOrder> = orders
            .values()
            .filter(|o| o.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let mut orders = self.orders.write().await;

        match orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.apply(change);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn attach_payment(
        &self,
        id: Uuid,
        reference: &str,
        status: PaymentStatus,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let mut orders = self.orders.write().await;

        let taken = orders
            .values()
            .any(|o| o.id != id && o.payment.gateway_reference.as_deref() == Some(reference));
        if taken {
            return Err(RepositoryError::DuplicateKey(UniqueField::GatewayReference));
        }

        Ok(orders.get_mut(&id).map(|order| {
            order.payment.gateway_reference = Some(reference.to_string());
            order.payment.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn update_payment_status(
        &self,
        reference: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Option<ReturnOrder>> {
        let mut orders = self.orders.write().await;

        Ok(orders
            .values_mut()
            .find(|o| {
                o.payment.gateway_reference.as_deref() == Some(reference)
                    && !o.payment.status.is_settled()
            })
            .map(|order| {
                order.payment.status = status;
                if paid_at.is_some() {
                    order.payment.paid_at = paid_at;
                }
                order.updated_at = Utc::now();
                order.clone()
            }))
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryStore {
    async fn create_receipt(&self, receipt: &Receipt) -> RepositoryResult<()> {
        let mut receipts = self.receipts.write().await;

        if receipts.values().any(|r| r.order_id == receipt.order_id) {
            return Err(RepositoryError::DuplicateKey(UniqueField::ReceiptOrder));
        }
        receipts.insert(receipt.id, receipt.clone());
        Ok(())
    }

    async fn receipt_for_order(&self, order_id: Uuid) -> RepositoryResult<Option<Receipt>> {
        let receipts = self.receipts.read().await;
        Ok(receipts.values().find(|r| r.order_id == order_id).cloned())
    }

    async fn get_receipt(&self, id: Uuid, owner_id: &str) -> RepositoryResult<Option<Receipt>> {
        let receipts = self.receipts.read().await;
        Ok(receipts.get(&id).filter(|r| r.owner_id == owner_id).cloned())
    }

    async fn list_receipts(&self, owner_id: &str) -> RepositoryResult<Vec<Receipt>> {
        let receipts = self.receipts.read().await;
        let mut owned: Vec<Receipt> = receipts
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(owned)
    }
}
