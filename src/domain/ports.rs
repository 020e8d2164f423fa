use super::money::{Amount, Balance, Money};
use super::order::{Order, OrderNumber, OrderStatus, Registration, UserId, Withdrawal};
use super::transition::Outcome;
use crate::error::{AccrualError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Persistent home of orders and withdrawals.
///
/// Any operation that changes a user's derivable balance runs as one
/// serialized transaction that re-reads the balance it depends on.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Admits a checksum-valid order for `owner`.
    async fn register_order(&self, owner: UserId, number: OrderNumber) -> Result<Registration>;

    /// Orders still awaiting a verdict (`New` or `Processing`), oldest first.
    async fn select_pending(&self) -> Result<Vec<Order>>;

    /// Persists a forward status step. A no-op when the order is already
    /// terminal or the step would not move it forward.
    async fn apply_outcome(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Money>,
    ) -> Result<()>;

    /// Debits `amount` from `owner`, failing atomically with
    /// `InsufficientBalance` when the current balance does not cover it.
    async fn withdraw(
        &self,
        owner: UserId,
        number: OrderNumber,
        amount: Amount,
    ) -> Result<Withdrawal>;

    async fn balance_of(&self, owner: UserId) -> Result<Balance>;

    /// The user's orders, oldest first.
    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>>;

    /// The user's withdrawals, oldest first.
    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>>;

    /// Every user that owns an order or a withdrawal, ascending.
    async fn owners(&self) -> Result<Vec<UserId>>;
}

/// External service deciding how much cashback an order earns.
#[async_trait]
pub trait AccrualService: Send + Sync {
    /// One lookup, no retries.
    async fn lookup(&self, number: &OrderNumber) -> std::result::Result<Outcome, AccrualError>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type AccrualServiceRef = Arc<dyn AccrualService>;
