use chrono::Utc;
use rand::Rng;

/// Source of the human-shareable identifiers stamped on a new order.
///
/// Uniqueness is enforced by the store; generators only need to make
/// collisions unlikely.
pub trait IdentifierGenerator: Send + Sync {
    fn order_number(&self) -> String;

    /// `None` lets the tracking number fall back to the order number
    fn tracking_number(&self) -> Option<String>;

    fn pickup_pin(&self) -> String;
}

/// `RTN-{millis}-{n}`, `TRK-{base36 millis}-{n}` and a 4-digit PIN
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentifiers;

impl IdentifierGenerator for RandomIdentifiers {
    fn order_number(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: u32 = rand::thread_rng().gen_range(0..1000);
        format!("RTN-{}-{}", millis, suffix)
    }

    fn tracking_number(&self) -> Option<String> {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
        Some(format!("TRK-{}-{}", to_base36(millis), suffix))
    }

    fn pickup_pin(&self) -> String {
        rand::thread_rng().gen_range(1000..10000).to_string()
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1295), "ZZ");
    }

    #[test]
    fn test_identifier_formats() {
        let ids = RandomIdentifiers;

        let order_number = ids.order_number();
        let parts: Vec<&str> = order_number.split('-').collect();
        assert_eq!(parts[0], "RTN");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u32>().unwrap() < 1000);

        let tracking = ids.tracking_number().unwrap();
        assert!(tracking.starts_with("TRK-"));
        let n: u32 = tracking.rsplit('-').next().unwrap().parse().unwrap();
        assert!((1000..10000).contains(&n));

        let pin = ids.pickup_pin();
        assert_eq!(pin.len(), 4);
        assert!(pin.chars().all(|c| c.is_ascii_digit()));
    }
}
