//! Application layer containing the ledger's use cases.
//!
//! `LoyaltyLedger` serves synchronous user requests (order submission,
//! withdrawals, balance queries) and `ReconciliationWorker` is the background
//! task that settles orders against the external accrual service. Both talk to
//! storage only through the `LedgerStore` port.

pub mod ledger;
pub mod worker;
