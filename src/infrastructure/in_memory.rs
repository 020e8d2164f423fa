use crate::domain::money::{Amount, Balance, Money};
use crate::domain::order::{Order, OrderNumber, OrderStatus, Registration, UserId, Withdrawal};
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    orders: HashMap<OrderNumber, Order>,
    withdrawals: Vec<Withdrawal>,
}

impl LedgerState {
    fn accrued(&self, owner: UserId) -> Result<Money> {
        Money::try_sum(
            self.orders
                .values()
                .filter(|order| order.owner == owner && order.status == OrderStatus::Processed)
                .filter_map(|order| order.accrual),
        )
    }

    fn balance_of(&self, owner: UserId) -> Result<Balance> {
        let withdrawn = Money::try_sum(
            self.withdrawals
                .iter()
                .filter(|w| w.owner == owner)
                .map(|w| w.amount.value()),
        )?;
        Balance::from_totals(self.accrued(owner)?, withdrawn)
    }
}

/// A thread-safe in-memory ledger.
///
/// A single `RwLock` guards orders and withdrawals together, so every write
/// holds the only write guard while it re-reads the balance it depends on.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn register_order(&self, owner: UserId, number: OrderNumber) -> Result<Registration> {
        let mut state = self.state.write().await;
        match state.orders.get(&number) {
            Some(existing) if existing.owner == owner => Ok(Registration::AlreadyRegistered),
            Some(_) => Err(LedgerError::OrderOwnedByAnotherUser(number.to_string())),
            None => {
                state.orders.insert(number.clone(), Order::new(number, owner));
                Ok(Registration::Created)
            }
        }
    }

    async fn select_pending(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut pending: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(pending)
    }

    async fn apply_outcome(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Money>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get(number)
            .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))?;
        if status == OrderStatus::Processed && order.status.can_advance_to(status) {
            // Refuse a credit the balance could no longer represent.
            let credit = accrual.unwrap_or(Money::ZERO);
            if state.accrued(order.owner)?.checked_add(credit).is_none() {
                return Err(LedgerError::ValidationError(format!(
                    "accrual {credit} on order {number} overflows the balance of user {}",
                    order.owner
                )));
            }
        }
        if let Some(order) = state.orders.get_mut(number) {
            order.advance(status, accrual);
        }
        Ok(())
    }

    async fn withdraw(
        &self,
        owner: UserId,
        number: OrderNumber,
        amount: Amount,
    ) -> Result<Withdrawal> {
        let mut state = self.state.write().await;
        if state.withdrawals.iter().any(|w| w.order_number == number) {
            return Err(LedgerError::DuplicateWithdrawal(number.to_string()));
        }
        let balance = state.balance_of(owner)?;
        if balance.current < amount.value() {
            return Err(LedgerError::InsufficientBalance {
                requested: amount.value(),
                available: balance.current,
            });
        }
        let withdrawal = Withdrawal {
            order_number: number,
            owner,
            amount,
            processed_at: Utc::now(),
        };
        state.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn balance_of(&self, owner: UserId) -> Result<Balance> {
        let state = self.state.read().await;
        state.balance_of(owner)
    }

    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.owner == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>> {
        let state = self.state.read().await;
        Ok(state
            .withdrawals
            .iter()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect())
    }

    async fn owners(&self) -> Result<Vec<UserId>> {
        let state = self.state.read().await;
        let owners: BTreeSet<UserId> = state
            .orders
            .values()
            .map(|order| order.owner)
            .chain(state.withdrawals.iter().map(|w| w.owner))
            .collect();
        Ok(owners.into_iter().collect())
    }
}
