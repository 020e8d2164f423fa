//! Order state machine: maps accrual-service outcomes to local status changes.

use super::money::Money;
use super::order::OrderStatus;

/// The accrual service's verdict for an order it knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Registered,
    Processing,
    Invalid,
    Processed { accrual: Money },
}

/// Classified result of one accrual lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The service has no record of the order yet.
    NotRegistered,
    /// The service asked us to back off.
    RateLimited,
    Verdict(Verdict),
}

/// What the worker should do with an order after a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Leave the order as it is; it is polled again next tick.
    Keep,
    /// Persist a forward step. `accrual` is only present for `Processed`.
    Advance {
        status: OrderStatus,
        accrual: Option<Money>,
    },
    /// Stop issuing lookups for the rest of the tick.
    AbortBatch,
}

pub fn transition(current: OrderStatus, outcome: &Outcome) -> Transition {
    if current.is_terminal() {
        return Transition::Keep;
    }
    match outcome {
        Outcome::RateLimited => Transition::AbortBatch,
        Outcome::NotRegistered => Transition::Keep,
        Outcome::Verdict(Verdict::Registered) => Transition::Keep,
        Outcome::Verdict(Verdict::Processing) => match current {
            OrderStatus::Processing => Transition::Keep,
            _ => Transition::Advance {
                status: OrderStatus::Processing,
                accrual: None,
            },
        },
        Outcome::Verdict(Verdict::Invalid) => Transition::Advance {
            status: OrderStatus::Invalid,
            accrual: None,
        },
        Outcome::Verdict(Verdict::Processed { accrual }) => Transition::Advance {
            status: OrderStatus::Processed,
            accrual: Some(*accrual),
        },
    }
}
