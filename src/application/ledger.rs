use crate::domain::money::{Amount, Balance, Money};
use crate::domain::order::{Order, OrderNumber, Registration, UserId, Withdrawal};
use crate::domain::ports::LedgerStoreRef;
use crate::error::Result;

/// User-facing ledger operations.
///
/// Raw order numbers are sanitized and checksum-validated here, so nothing
/// invalid ever reaches the store.
#[derive(Clone)]
pub struct LoyaltyLedger {
    store: LedgerStoreRef,
}

impl LoyaltyLedger {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Submits an order number for cashback evaluation.
    pub async fn register_order(&self, user: UserId, raw_number: &str) -> Result<Registration> {
        let number = OrderNumber::parse(raw_number)?;
        let registration = self.store.register_order(user, number).await?;
        tracing::debug!(user, order = raw_number, ?registration, "Order submitted");
        Ok(registration)
    }

    /// Debits `amount_minor` from the user's balance, attributed to `raw_number`.
    ///
    /// The number must pass the checksum but need not match a registered order.
    pub async fn withdraw(
        &self,
        user: UserId,
        raw_number: &str,
        amount_minor: i64,
    ) -> Result<Withdrawal> {
        let number = OrderNumber::parse(raw_number)?;
        let amount = Amount::new(Money::from_minor(amount_minor))?;
        let withdrawal = self.store.withdraw(user, number, amount).await?;
        tracing::info!(user, order = raw_number, amount = %amount.value(), "Withdrawal recorded");
        Ok(withdrawal)
    }

    pub async fn balance(&self, user: UserId) -> Result<Balance> {
        self.store.balance_of(user).await
    }

    pub async fn orders(&self, user: UserId) -> Result<Vec<Order>> {
        self.store.orders_of(user).await
    }

    pub async fn withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>> {
        self.store.withdrawals_of(user).await
    }

    /// Balances of every known user, ascending by user.
    pub async fn balances(&self) -> Result<Vec<(UserId, Balance)>> {
        let mut balances = Vec::new();
        for user in self.store.owners().await? {
            balances.push((user, self.store.balance_of(user).await?));
        }
        Ok(balances)
    }
}
