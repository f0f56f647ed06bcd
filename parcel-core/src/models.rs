use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::payment::{Currency, PaymentMethod, PaymentStatus};
use crate::pii::Masked;
use crate::CoreError;

/// Return order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    Scheduled,
    PickedUp,
    Returned,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Draft,
        OrderStatus::Pending,
        OrderStatus::Scheduled,
        OrderStatus::PickedUp,
        OrderStatus::Returned,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::Scheduled => "scheduled",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Returned => "returned",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown order status: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PackageSize {
    Small,
    Medium,
    Large,
    Xlarge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Carrier {
    #[serde(rename = "PostAT")]
    PostAt,
    #[serde(rename = "DHL")]
    Dhl,
    Hermes,
    #[serde(rename = "DPD")]
    Dpd,
    #[serde(rename = "UPS")]
    Ups,
    #[serde(rename = "GLS")]
    Gls,
}

/// A package as submitted by a client.
///
/// `price` is never read from client JSON; server-side callers may pin an
/// explicit price, otherwise the size table applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageSpec {
    pub size: PackageSize,
    pub dimensions: String,
    #[serde(default)]
    pub label_attached: bool,
    pub carrier: Carrier,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

/// A priced package as persisted on an order. Prices are in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub size: PackageSize,
    pub dimensions: String,
    pub label_attached: bool,
    pub carrier: Carrier,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupAddress {
    pub building: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<Masked<String>>,
}

impl PickupAddress {
    /// One-line display form: `building, Floor f, Door d, directions`
    pub fn formatted(&self) -> String {
        let mut parts = vec![self.building.clone()];
        if let Some(floor) = self.floor.as_deref().filter(|f| !f.is_empty()) {
            parts.push(format!("Floor {}", floor));
        }
        if let Some(door) = self.door_number.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("Door {}", door));
        }
        if let Some(directions) = self.directions.as_deref().filter(|d| !d.is_empty()) {
            parts.push(directions.to_string());
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub date: NaiveDate,
    pub time_window: TimeWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub gateway_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StatusHistoryEntry {
    pub fn new(status: OrderStatus, notes: Option<String>) -> Self {
        Self {
            status,
            changed_at: Utc::now(),
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    pub order_number: String,
    pub tracking_number: String,
    #[serde(rename = "pickupPIN")]
    pub pickup_pin: Masked<String>,
}

impl OrderMetadata {
    /// The tracking number falls back to the order number when none was assigned.
    pub fn new(order_number: String, tracking_number: Option<String>, pickup_pin: String) -> Self {
        let tracking_number = tracking_number.unwrap_or_else(|| order_number.clone());
        Self {
            order_number,
            tracking_number,
            pickup_pin: Masked(pickup_pin),
        }
    }
}

/// The single source of truth for a customer's return pickup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOrder {
    pub id: Uuid,
    pub owner_id: String,
    pub pickup_address: PickupAddress,
    pub packages: Vec<Package>,
    pub schedule: Schedule,
    pub payment: PaymentInfo,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub metadata: OrderMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReturnOrder {
    /// First history entry recorded for `status`, if the order ever reached it.
    pub fn history_entry(&self, status: OrderStatus) -> Option<&StatusHistoryEntry> {
        self.status_history.iter().find(|entry| entry.status == status)
    }

    /// Apply a precomputed status change. Callers are responsible for legality.
    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.status;
        self.status_history.push(change.entry.clone());
        if let Some(settlement) = &change.settlement {
            self.payment.status = settlement.status;
            self.payment.paid_at = Some(settlement.paid_at);
        }
        self.updated_at = change.entry.changed_at;
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Payment fields written together with a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSettlement {
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

/// A status change ready to be committed: the new status, its history entry,
/// and any payment fields that move with it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub entry: StatusHistoryEntry,
    pub settlement: Option<PaymentSettlement>,
}

/// Proof-of-order record linking an owner to an order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: Uuid,
    pub owner_id: String,
    pub order_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub receipt_url: Option<String>,
}

impl Receipt {
    pub fn new(owner_id: String, order_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            order_id,
            generated_at: Utc::now(),
            receipt_url: None,
        }
    }
}
