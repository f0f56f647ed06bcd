use chrono::{DateTime, NaiveDate, Utc};
use parcel_core::{
    Carrier, Currency, Masked, OrderStatus, PackageSize, Receipt, ReturnOrder, TimeWindow,
};
use serde::Serialize;
use uuid::Uuid;

/// Customer-facing label for a lifecycle state
pub fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Draft => "Draft",
        OrderStatus::Pending => "Pending Approval",
        OrderStatus::Scheduled => "Planned Pickup",
        OrderStatus::PickedUp => "Picked Up",
        OrderStatus::Returned => "Return Completed",
        OrderStatus::Cancelled => "Cancelled",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPackage {
    pub size: PackageSize,
    pub carrier: Carrier,
    pub price: i64,
    pub label_attached: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedPickup {
    pub date: NaiveDate,
    pub time_window: TimeWindow,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub code: OrderStatus,
    pub current: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<PlannedPickup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up: Option<Milestone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<Milestone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<Milestone>,
}

/// Read-side view of an order for tracking pages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub order_id: Uuid,
    pub order_number: String,
    pub tracking_number: String,
    /// Shown to the owner so the pickup agent can verify it
    #[serde(rename = "pickupPIN")]
    pub pickup_pin: Masked<String>,
    pub packages: Vec<TrackedPackage>,
    pub status: TrackingStatus,
    pub pickup_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn milestone(order: &ReturnOrder, status: OrderStatus) -> Option<Milestone> {
    order.history_entry(status).map(|entry| Milestone {
        at: entry.changed_at,
        notes: entry.notes.clone(),
    })
}

impl From<&ReturnOrder> for TrackingInfo {
    fn from(order: &ReturnOrder) -> Self {
        let planned = order
            .history_entry(OrderStatus::Scheduled)
            .map(|entry| PlannedPickup {
                date: order.schedule.date,
                time_window: order.schedule.time_window.clone(),
                confirmed_at: entry.changed_at,
            });

        TrackingInfo {
            order_id: order.id,
            order_number: order.metadata.order_number.clone(),
            tracking_number: order.metadata.tracking_number.clone(),
            pickup_pin: order.metadata.pickup_pin.clone(),
            packages: order
                .packages
                .iter()
                .map(|p| TrackedPackage {
                    size: p.size,
                    carrier: p.carrier,
                    price: p.price,
                    label_attached: p.label_attached,
                })
                .collect(),
            status: TrackingStatus {
                code: order.status,
                current: status_label(order.status),
                planned,
                picked_up: milestone(order, OrderStatus::PickedUp),
                returned: milestone(order, OrderStatus::Returned),
                cancelled: milestone(order, OrderStatus::Cancelled),
            },
            pickup_address: order.pickup_address.formatted(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// A receipt joined with the order it proves
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub tracking_number: String,
    pub status: OrderStatus,
    pub amount: i64,
    pub currency: Currency,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

impl ReceiptView {
    pub fn new(receipt: &Receipt, order: &ReturnOrder) -> Self {
        Self {
            id: receipt.id,
            order_id: order.id,
            order_number: order.metadata.order_number.clone(),
            tracking_number: order.metadata.tracking_number.clone(),
            status: order.status,
            amount: order.payment.amount,
            currency: order.payment.currency,
            generated_at: receipt.generated_at,
            receipt_url: receipt.receipt_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::{
        OrderMetadata, Package, PaymentInfo, PaymentMethod, PaymentStatus, PickupAddress, Schedule,
        StatusHistoryEntry,
    };

    fn order(history: &[(OrderStatus, Option<&str>)]) -> ReturnOrder {
        let now = Utc::now();
        let status = history.last().map(|(s, _)| *s).unwrap_or(OrderStatus::Pending);
        ReturnOrder {
            id: Uuid::new_v4(),
            owner_id: "user-1".to_string(),
            pickup_address: PickupAddress {
                building: "Hauptstrasse 12".to_string(),
                floor: Some("3".to_string()),
                door_number: Some("7".to_string()),
                directions: None,
                contact_phone: None,
            },
            packages: vec![Package {
                size: PackageSize::Medium,
                dimensions: "20x20x20".to_string(),
                label_attached: true,
                carrier: Carrier::PostAt,
                price: 699,
            }],
            schedule: Schedule {
                date: NaiveDate::from_ymd_opt(2030, 3, 4).unwrap(),
                time_window: TimeWindow {
                    start: "08:00".to_string(),
                    end: "10:00".to_string(),
                },
            },
            payment: PaymentInfo {
                method: PaymentMethod::StripeCard,
                amount: 699,
                currency: Currency::Eur,
                status: PaymentStatus::Pending,
                gateway_reference: None,
                paid_at: None,
            },
            status,
            status_history: history
                .iter()
                .map(|(s, n)| StatusHistoryEntry::new(*s, n.map(str::to_string)))
                .collect(),
            metadata: OrderMetadata::new("RTN-1-1".to_string(), None, "4821".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pending_order_has_no_milestones() {
        let info = TrackingInfo::from(&order(&[(OrderStatus::Pending, None)]));
        assert_eq!(info.status.current, "Pending Approval");
        assert!(info.status.planned.is_none());
        assert!(info.status.picked_up.is_none());
        assert_eq!(info.tracking_number, "RTN-1-1");
        assert_eq!(info.pickup_address, "Hauptstrasse 12, Floor 3, Door 7");
    }

    #[test]
    fn test_milestones_follow_history() {
        let info = TrackingInfo::from(&order(&[
            (OrderStatus::Pending, None),
            (OrderStatus::Scheduled, None),
            (OrderStatus::Cancelled, Some("Not at home")),
        ]));
        assert_eq!(info.status.current, "Cancelled");
        let planned = info.status.planned.unwrap();
        assert_eq!(planned.time_window.start, "08:00");
        assert_eq!(info.status.cancelled.unwrap().notes.as_deref(), Some("Not at home"));
    }

    #[test]
    fn test_tracking_json_shape() {
        let info = TrackingInfo::from(&order(&[(OrderStatus::Pending, None)]));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["orderNumber"], "RTN-1-1");
        assert_eq!(json["status"]["code"], "pending");
        assert_eq!(json["packages"][0]["carrier"], "PostAT");
        assert!(json["status"].get("planned").is_none());
        assert_eq!(json["pickupPIN"], "4821");
    }

    #[test]
    fn test_labels_cover_every_status() {
        for status in OrderStatus::ALL {
            assert!(!status_label(status).is_empty());
        }
        assert_eq!(status_label(OrderStatus::Returned), "Return Completed");
    }
}
