mod common;

use async_trait::async_trait;
use common::{MockAccrual, Reply};
use loyalty_ledger::application::ledger::LoyaltyLedger;
use loyalty_ledger::application::worker::{ReconciliationWorker, WorkerConfig};
use loyalty_ledger::domain::checksum::with_check_digit;
use loyalty_ledger::domain::money::Money;
use loyalty_ledger::domain::order::{OrderNumber, OrderStatus};
use loyalty_ledger::domain::ports::{AccrualService, LedgerStore};
use loyalty_ledger::domain::transition::{Outcome, Verdict};
use loyalty_ledger::error::{AccrualError, LedgerError};
use loyalty_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use loyalty_ledger::interfaces::accrual::{AccrualClientConfig, HttpAccrualClient};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(max_in_flight: usize) -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(20),
        max_in_flight,
    }
}

async fn assert_balance_invariant(store: &dyn LedgerStore, user: u64) {
    let accrued = Money::try_sum(
        store
            .orders_of(user)
            .await
            .unwrap()
            .into_iter()
            .filter(|o| o.status == OrderStatus::Processed)
            .filter_map(|o| o.accrual),
    )
    .unwrap();
    let withdrawn = Money::try_sum(
        store
            .withdrawals_of(user)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.amount.value()),
    )
    .unwrap();
    let balance = store.balance_of(user).await.unwrap();
    assert_eq!(Some(balance.current), accrued.checked_sub(withdrawn));
    assert_eq!(balance.withdrawn, withdrawn);
    assert!(balance.current >= Money::ZERO);
}

#[tokio::test]
async fn test_settlement_over_http_then_withdrawal() {
    let mock = MockAccrual::default();
    let older = "4561261212345467";
    let limited = with_check_digit("12345").unwrap();
    let newest = with_check_digit("67890").unwrap();
    mock.processed(older, 5.0);
    mock.reply(&limited, Reply::TooManyRequests);
    mock.processed(&newest, 1.0);

    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = LoyaltyLedger::new(store.clone());
    for raw in [older, limited.as_str(), newest.as_str()] {
        ledger.register_order(1, raw).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let client = HttpAccrualClient::new(AccrualClientConfig::new(mock.serve().await)).unwrap();
    let worker = ReconciliationWorker::new(store.clone(), Arc::new(client), config(1));

    let report = worker.tick().await.unwrap();
    assert!(report.rate_limited);
    assert_eq!(report.advanced, 1);
    assert_eq!(mock.hits(), vec![older.to_string(), limited.clone()]);

    let orders = ledger.orders(1).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Processed);
    assert_eq!(orders[0].accrual, Some(Money::from_minor(500)));
    assert_eq!(orders[1].status, OrderStatus::New);
    assert_eq!(orders[2].status, OrderStatus::New);

    let balance = ledger.balance(1).await.unwrap();
    assert_eq!(balance.current, Money::from_minor(500));

    assert!(matches!(
        ledger.withdraw(1, "79927398713", 600).await,
        Err(LedgerError::InsufficientBalance { .. })
    ));
    assert_eq!(ledger.balance(1).await.unwrap(), balance);

    ledger.withdraw(1, "79927398713", 200).await.unwrap();
    let balance = ledger.balance(1).await.unwrap();
    assert_eq!(balance.current, Money::from_minor(300));
    assert_eq!(balance.withdrawn, Money::from_minor(200));
    assert_balance_invariant(store.as_ref(), 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_withdrawals_racing_settlement_never_overdraw() {
    let mock = MockAccrual::default();
    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = LoyaltyLedger::new(store.clone());

    ledger.register_order(5, "4561261212345467").await.unwrap();
    store
        .apply_outcome(
            &OrderNumber::parse("4561261212345467").unwrap(),
            OrderStatus::Processed,
            Some(Money::from_minor(1000)),
        )
        .await
        .unwrap();
    let late = with_check_digit("555").unwrap();
    ledger.register_order(5, &late).await.unwrap();
    mock.processed(&late, 5.0);

    let client = HttpAccrualClient::new(AccrualClientConfig::new(mock.serve().await)).unwrap();
    let worker = ReconciliationWorker::new(store.clone(), Arc::new(client), config(4));

    let settle = tokio::spawn(async move { worker.tick().await });
    let mut withdrawals = Vec::new();
    for i in 0..10u32 {
        let ledger = ledger.clone();
        let raw = with_check_digit(&format!("8{i:03}")).unwrap();
        withdrawals.push(tokio::spawn(async move {
            ledger.withdraw(5, &raw, 200).await
        }));
    }

    let mut succeeded = 0;
    for handle in withdrawals {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientBalance { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    settle.await.unwrap().unwrap();

    // 1000 is always available; the extra 500 only if settlement won the race.
    assert!((5..=7).contains(&succeeded), "{succeeded} withdrawals succeeded");
    let balance = store.balance_of(5).await.unwrap();
    assert_eq!(balance.withdrawn, Money::from_minor(200 * succeeded));
    assert_eq!(
        balance.current,
        Money::from_minor(1500 - 200 * succeeded)
    );
    assert_balance_invariant(store.as_ref(), 5).await;
}

/// Accrual service answering each lookup with a random outcome.
struct RandomAccrual {
    rng: Mutex<StdRng>,
}

#[async_trait]
impl AccrualService for RandomAccrual {
    async fn lookup(&self, _number: &OrderNumber) -> Result<Outcome, AccrualError> {
        let mut rng = self.rng.lock().unwrap();
        Ok(match rng.gen_range(0..7) {
            0 => Outcome::NotRegistered,
            1 => Outcome::RateLimited,
            2 => Outcome::Verdict(Verdict::Registered),
            3 | 4 => Outcome::Verdict(Verdict::Processing),
            5 => Outcome::Verdict(Verdict::Invalid),
            _ => Outcome::Verdict(Verdict::Processed {
                accrual: Money::from_minor(rng.gen_range(0..10_000)),
            }),
        })
    }
}

#[tokio::test]
async fn test_status_history_is_monotonic() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = LoyaltyLedger::new(store.clone());
    for i in 0..25 {
        let raw = with_check_digit(&format!("{}", 40_000 + i)).unwrap();
        ledger.register_order(9, &raw).await.unwrap();
    }

    let accrual = Arc::new(RandomAccrual {
        rng: Mutex::new(StdRng::seed_from_u64(17)),
    });
    let worker = ReconciliationWorker::new(store.clone(), accrual, config(4));

    let mut history: HashMap<String, (OrderStatus, Option<Money>)> = HashMap::new();
    for _ in 0..40 {
        worker.tick().await.unwrap();
        for order in ledger.orders(9).await.unwrap() {
            if let Some((previous, accrual)) = history.get(order.number.as_str()) {
                assert!(
                    order.status == *previous || previous.can_advance_to(order.status),
                    "{} regressed from {previous:?} to {:?}",
                    order.number,
                    order.status
                );
                if previous.is_terminal() {
                    assert_eq!(order.status, *previous);
                    assert_eq!(order.accrual, *accrual);
                }
            }
            history.insert(order.number.to_string(), (order.status, order.accrual));
        }
        assert_balance_invariant(store.as_ref(), 9).await;
    }

    assert!(
        history.values().any(|(status, _)| status.is_terminal()),
        "no order ever settled"
    );
}
