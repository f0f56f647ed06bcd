use chrono::{NaiveTime, Utc};
use parcel_core::{Currency, PackageSpec, PaymentMethod, PickupAddress, Schedule};
use serde::Deserialize;

pub const MAX_PACKAGES: usize = 10;
pub const MAX_DIRECTIONS_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{0}")]
    Invalid(String),

    #[error("Unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("Amount is computed by the server and must not be supplied")]
    AmountNotAllowed,
}

/// Client-supplied payment block. Only present so a smuggled amount can be rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPayment {
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
}

/// Order data as it arrives from a client, before any checks
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default)]
    pub pickup_address: Option<PickupAddress>,
    #[serde(default)]
    pub packages: Option<Vec<PackageSpec>>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub payment: Option<ClientPayment>,
}

/// Order data that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub pickup_address: PickupAddress,
    pub packages: Vec<PackageSpec>,
    pub schedule: Schedule,
    pub method: PaymentMethod,
    pub currency: Currency,
}

impl OrderRequest {
    pub fn carries_amount(&self) -> bool {
        self.amount.is_some() || self.payment.as_ref().is_some_and(|p| p.amount.is_some())
    }

    pub fn validate(self) -> Result<ValidatedOrder, ValidationError> {
        if self.carries_amount() {
            return Err(ValidationError::AmountNotAllowed);
        }

        let mut missing = Vec::new();
        if self.pickup_address.is_none() {
            missing.push("pickupAddress");
        }
        if !self.packages.as_ref().is_some_and(|p| !p.is_empty()) {
            missing.push("packages");
        }
        if self.schedule.is_none() {
            missing.push("schedule");
        }
        if !self.payment_method.as_deref().is_some_and(|m| !m.is_empty()) {
            missing.push("paymentMethod");
        }

        let (Some(pickup_address), Some(packages), Some(schedule), Some(method)) = (
            self.pickup_address,
            self.packages,
            self.schedule,
            self.payment_method,
        ) else {
            return Err(ValidationError::MissingFields(missing));
        };
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let method = parse_method(&method)?;
        let currency = parse_currency(self.currency.as_deref())?;
        validate_address(&pickup_address)?;
        validate_packages(&packages)?;
        validate_schedule(&schedule)?;

        Ok(ValidatedOrder {
            pickup_address,
            packages,
            schedule,
            method,
            currency,
        })
    }
}

pub fn parse_method(method: &str) -> Result<PaymentMethod, ValidationError> {
    method
        .parse()
        .map_err(|_| ValidationError::UnsupportedPaymentMethod(method.to_string()))
}

/// Absent currency means EUR
pub fn parse_currency(currency: Option<&str>) -> Result<Currency, ValidationError> {
    match currency {
        None => Ok(Currency::default()),
        Some(code) => code
            .parse()
            .map_err(|e: parcel_core::CoreError| ValidationError::Invalid(e.to_string())),
    }
}

pub fn validate_packages(packages: &[PackageSpec]) -> Result<(), ValidationError> {
    if packages.is_empty() {
        return Err(ValidationError::MissingFields(vec!["packages"]));
    }
    if packages.len() > MAX_PACKAGES {
        return Err(ValidationError::Invalid(format!(
            "At most {} packages per order, got {}",
            MAX_PACKAGES,
            packages.len()
        )));
    }
    for (i, package) in packages.iter().enumerate() {
        if !is_valid_dimensions(&package.dimensions) {
            return Err(ValidationError::Invalid(format!(
                "packages[{}].dimensions must look like 30x20x10 (optionally followed by \" cm\"), got {:?}",
                i, package.dimensions
            )));
        }
    }
    Ok(())
}

pub fn validate_address(address: &PickupAddress) -> Result<(), ValidationError> {
    if address.building.trim().is_empty() {
        return Err(ValidationError::MissingFields(vec!["pickupAddress.building"]));
    }
    if let Some(directions) = &address.directions {
        if directions.chars().count() > MAX_DIRECTIONS_LEN {
            return Err(ValidationError::Invalid(format!(
                "pickupAddress.directions must be at most {} characters",
                MAX_DIRECTIONS_LEN
            )));
        }
    }
    if let Some(phone) = &address.contact_phone {
        if !is_valid_phone(phone.expose()) {
            return Err(ValidationError::Invalid(
                "pickupAddress.contactPhone is not a valid phone number".to_string(),
            ));
        }
    }
    Ok(())
}

/// Pickups are booked for today or later, in a forward `HH:MM` window
pub fn validate_schedule(schedule: &Schedule) -> Result<(), ValidationError> {
    if schedule.date < Utc::now().date_naive() {
        return Err(ValidationError::Invalid(
            "schedule.date must be today or later".to_string(),
        ));
    }
    let start = parse_clock(&schedule.time_window.start, "start")?;
    let end = parse_clock(&schedule.time_window.end, "end")?;
    if end <= start {
        return Err(ValidationError::Invalid(
            "schedule.timeWindow.end must be after start".to_string(),
        ));
    }
    Ok(())
}

fn parse_clock(value: &str, field: &str) -> Result<NaiveTime, ValidationError> {
    let invalid = || {
        ValidationError::Invalid(format!(
            "schedule.timeWindow.{} must be HH:MM, got {:?}",
            field, value
        ))
    };
    // NaiveTime alone would accept single-digit hours
    if value.len() != 5 {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| invalid())
}

/// `WxHxD` with positive integer sides and an optional ` cm` suffix
fn is_valid_dimensions(value: &str) -> bool {
    let sides = value.strip_suffix(" cm").unwrap_or(value);
    let parts: Vec<&str> = sides.split('x').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

fn is_valid_phone(value: &str) -> bool {
    let body = value.strip_prefix('+').unwrap_or(value);
    let len = body.chars().count();
    (6..=20).contains(&len)
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '-')
}
