use super::checksum;
use super::money::{Amount, Money};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type UserId = u64;

/// A checksum-valid purchase order number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Sanitizes and validates a raw submission.
    ///
    /// Empty input, surrounding whitespace and non-digit characters are
    /// rejected before the checksum is consulted.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::InvalidOrderNumber(raw.to_string()));
        }
        if !checksum::is_valid(raw) {
            return Err(LedgerError::InvalidOrderNumber(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local status of an order. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Position in the forward order `New < Processing < {Invalid, Processed}`.
    pub fn rank(self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Invalid | OrderStatus::Processed => 2,
        }
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// A purchase order submitted for cashback evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub number: OrderNumber,
    pub owner: UserId,
    pub status: OrderStatus,
    /// Set exactly once, on the transition into `Processed`.
    pub accrual: Option<Money>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(number: OrderNumber, owner: UserId) -> Self {
        Self {
            number,
            owner,
            status: OrderStatus::New,
            accrual: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the order still awaits a verdict from the accrual service.
    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Applies a forward transition. Returns `false` without touching the
    /// order when it is terminal or the step would not move forward.
    pub fn advance(&mut self, status: OrderStatus, accrual: Option<Money>) -> bool {
        if !self.status.can_advance_to(status) {
            return false;
        }
        self.status = status;
        if status == OrderStatus::Processed {
            self.accrual = Some(accrual.unwrap_or(Money::ZERO));
        }
        true
    }
}

/// A debit against a user's accumulated cashback. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub order_number: OrderNumber,
    pub owner: UserId,
    pub amount: Amount,
    pub processed_at: DateTime<Utc>,
}

/// Result of submitting an order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyRegistered,
}
