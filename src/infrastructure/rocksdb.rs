use crate::domain::money::{Amount, Balance, Money};
use crate::domain::order::{Order, OrderNumber, OrderStatus, Registration, UserId, Withdrawal};
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, Snapshot};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for orders, keyed by order number.
pub const CF_ORDERS: &str = "orders";
/// Column Family for withdrawals, keyed by the order number they are attributed to.
pub const CF_WITHDRAWALS: &str = "withdrawals";

/// A persistent ledger backed by RocksDB.
///
/// Writes that depend on existing state (registration, settlement, withdrawal)
/// hold `write_lock` for their whole read-check-write sequence, which makes
/// them serializable against each other. Reads never take the lock; reads
/// spanning both column families go through one RocksDB snapshot.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("orders" and "withdrawals") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_withdrawals = ColumnFamilyDescriptor::new(CF_WITHDRAWALS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_withdrawals])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::internal(format!("{name} column family not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| LedgerError::internal(format!("Serialization error: {e}")))?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, snapshot: &Snapshot<'_>, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in snapshot.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(decode(&value)?);
        }
        Ok(items)
    }

    fn accrued(&self, snapshot: &Snapshot<'_>, owner: UserId) -> Result<Money> {
        Money::try_sum(
            self.scan::<Order>(snapshot, CF_ORDERS)?
                .into_iter()
                .filter(|order| order.owner == owner && order.status == OrderStatus::Processed)
                .filter_map(|order| order.accrual),
        )
    }

    fn balance_at(&self, snapshot: &Snapshot<'_>, owner: UserId) -> Result<Balance> {
        let withdrawn = Money::try_sum(
            self.scan::<Withdrawal>(snapshot, CF_WITHDRAWALS)?
                .into_iter()
                .filter(|w| w.owner == owner)
                .map(|w| w.amount.value()),
        )?;
        Balance::from_totals(self.accrued(snapshot, owner)?, withdrawn)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::internal(format!("Deserialization error: {e}")))
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn register_order(&self, owner: UserId, number: OrderNumber) -> Result<Registration> {
        let _guard = self.write_lock.lock().await;
        match self.get::<Order>(CF_ORDERS, number.as_str())? {
            Some(existing) if existing.owner == owner => Ok(Registration::AlreadyRegistered),
            Some(_) => Err(LedgerError::OrderOwnedByAnotherUser(number.to_string())),
            None => {
                let order = Order::new(number, owner);
                self.put(CF_ORDERS, order.number.as_str(), &order)?;
                Ok(Registration::Created)
            }
        }
    }

    async fn select_pending(&self) -> Result<Vec<Order>> {
        let snapshot = self.db.snapshot();
        let mut pending: Vec<Order> = self
            .scan::<Order>(&snapshot, CF_ORDERS)?
            .into_iter()
            .filter(Order::is_pending)
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
        let _guard = self.write_lock.lock().await;
        let mut order: Order = self
            .get(CF_ORDERS, number.as_str())?
            .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))?;
        if status == OrderStatus::Processed && order.status.can_advance_to(status) {
            let credit = accrual.unwrap_or(Money::ZERO);
            let accrued = self.accrued(&self.db.snapshot(), order.owner)?;
            if accrued.checked_add(credit).is_none() {
                return Err(LedgerError::ValidationError(format!(
                    "accrual {credit} on order {number} overflows the balance of user {}",
                    order.owner
                )));
            }
        }
        if order.advance(status, accrual) {
            self.put(CF_ORDERS, number.as_str(), &order)?;
        }
        Ok(())
    }

    async fn withdraw(
        &self,
        owner: UserId,
        number: OrderNumber,
        amount: Amount,
    ) -> Result<Withdrawal> {
        let _guard = self.write_lock.lock().await;
        if self
            .get::<Withdrawal>(CF_WITHDRAWALS, number.as_str())?
            .is_some()
        {
            return Err(LedgerError::DuplicateWithdrawal(number.to_string()));
        }
        let balance = self.balance_at(&self.db.snapshot(), owner)?;
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
        self.put(CF_WITHDRAWALS, withdrawal.order_number.as_str(), &withdrawal)?;
        Ok(withdrawal)
    }

    async fn balance_of(&self, owner: UserId) -> Result<Balance> {
        self.balance_at(&self.db.snapshot(), owner)
    }

    async fn orders_of(&self, owner: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan::<Order>(&self.db.snapshot(), CF_ORDERS)?
            .into_iter()
            .filter(|order| order.owner == owner)
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn withdrawals_of(&self, owner: UserId) -> Result<Vec<Withdrawal>> {
        let mut withdrawals: Vec<Withdrawal> = self
            .scan::<Withdrawal>(&self.db.snapshot(), CF_WITHDRAWALS)?
            .into_iter()
            .filter(|w| w.owner == owner)
            .collect();
        withdrawals.sort_by(|a, b| a.processed_at.cmp(&b.processed_at));
        Ok(withdrawals)
    }

    async fn owners(&self) -> Result<Vec<UserId>> {
        let snapshot = self.db.snapshot();
        let mut owners: BTreeSet<UserId> = self
            .scan::<Order>(&snapshot, CF_ORDERS)?
            .into_iter()
            .map(|order| order.owner)
            .collect();
        owners.extend(
            self.scan::<Withdrawal>(&snapshot, CF_WITHDRAWALS)?
                .into_iter()
                .map(|w| w.owner),
        );
        Ok(owners.into_iter().collect())
    }
}
