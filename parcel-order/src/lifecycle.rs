use chrono::{DateTime, Utc};
use parcel_core::{OrderStatus, PaymentSettlement, PaymentStatus, StatusChange, StatusHistoryEntry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("A reason is required to cancel an order")]
    MissingCancellationReason,
}

/// Directed edges of the order state machine
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Draft => &[OrderStatus::Pending, OrderStatus::Cancelled],
        OrderStatus::Pending => &[OrderStatus::Scheduled, OrderStatus::Cancelled],
        OrderStatus::Scheduled => &[OrderStatus::PickedUp, OrderStatus::Cancelled],
        OrderStatus::PickedUp => &[OrderStatus::Returned],
        OrderStatus::Returned | OrderStatus::Cancelled => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn is_terminal(status: OrderStatus) -> bool {
    allowed_transitions(status).is_empty()
}

/// Compute the change that moves an order from `current` to `target`.
///
/// Blank notes count as absent. Reaching `picked_up` settles the payment.
pub fn plan_transition(
    current: OrderStatus,
    target: OrderStatus,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<StatusChange, TransitionError> {
    if !can_transition(current, target) {
        return Err(TransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if target == OrderStatus::Cancelled && notes.is_none() {
        return Err(TransitionError::MissingCancellationReason);
    }

    let settlement = (target == OrderStatus::PickedUp).then_some(PaymentSettlement {
        status: PaymentStatus::Completed,
        paid_at: now,
    });

    Ok(StatusChange {
        status: target,
        entry: StatusHistoryEntry {
            status: target,
            changed_at: now,
            notes,
        },
        settlement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGES: [(OrderStatus, OrderStatus); 7] = [
        (OrderStatus::Draft, OrderStatus::Pending),
        (OrderStatus::Draft, OrderStatus::Cancelled),
        (OrderStatus::Pending, OrderStatus::Scheduled),
        (OrderStatus::Pending, OrderStatus::Cancelled),
        (OrderStatus::Scheduled, OrderStatus::PickedUp),
        (OrderStatus::Scheduled, OrderStatus::Cancelled),
        (OrderStatus::PickedUp, OrderStatus::Returned),
    ];

    #[test]
    fn test_transition_table_matches_edges() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    can_transition(from, to),
                    EDGES.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(is_terminal(OrderStatus::Returned));
        assert!(is_terminal(OrderStatus::Cancelled));
        assert!(!is_terminal(OrderStatus::PickedUp));
    }

    #[test]
    fn test_pickup_settles_payment() {
        let now = Utc::now();
        let change =
            plan_transition(OrderStatus::Scheduled, OrderStatus::PickedUp, None, now).unwrap();
        assert_eq!(change.entry.status, OrderStatus::PickedUp);
        assert_eq!(
            change.settlement,
            Some(PaymentSettlement {
                status: PaymentStatus::Completed,
                paid_at: now
            })
        );

        let change =
            plan_transition(OrderStatus::Pending, OrderStatus::Scheduled, None, now).unwrap();
        assert!(change.settlement.is_none());
    }

    #[test]
    fn test_cancel_requires_reason() {
        let now = Utc::now();
        assert_eq!(
            plan_transition(OrderStatus::Pending, OrderStatus::Cancelled, Some("  ".into()), now),
            Err(TransitionError::MissingCancellationReason)
        );

        let change = plan_transition(
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            Some("Changed my mind".into()),
            now,
        )
        .unwrap();
        assert_eq!(change.entry.notes.as_deref(), Some("Changed my mind"));
    }

    #[test]
    fn test_illegal_edge_is_rejected_before_reason_check() {
        let err = plan_transition(OrderStatus::Returned, OrderStatus::Cancelled, None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Returned,
                to: OrderStatus::Cancelled
            }
        );
    }
}
