mod common;

use common::{
    FailingStore, GatedStore, engine_with, new_account, new_user, read_account, shared, submit,
};
use ledger_engine::application::outcome::{
    CreateAccountOutcome, CreateUserOutcome, GetAccountOutcome, GetTransferOutcome,
    TransferOutcome,
};
use ledger_engine::domain::ids::{AccountId, TransferId, UserId};
use ledger_engine::domain::transfer::TransferRequest;
use ledger_engine::error::{StoreError, SubmitError};
use ledger_engine::infrastructure::in_memory::InMemoryStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn request(user: UserId, src: AccountId, dst: AccountId, amount: Decimal) -> TransferRequest {
    TransferRequest::new(format!("{src}->{dst}"), user, src, dst, amount).unwrap()
}

#[tokio::test]
async fn test_opposing_transfers_settle_deterministically() {
    let (store, handle) = shared(InMemoryStore::new());
    let engine = engine_with(handle, 10, 50);

    let alice = new_user(&engine, "alice").await;
    let bob = new_user(&engine, "bob").await;
    let a = new_account(&engine, alice, dec!(100)).await;
    let b = new_account(&engine, bob, dec!(100)).await;

    let mut pending = Vec::new();
    for _ in 0..201 {
        let to_a = request(bob, b, a, dec!(0.35));
        pending.push(submit(|| engine.transfer(to_a.clone())).await);
        let to_b = request(alice, a, b, dec!(0.17));
        pending.push(submit(|| engine.transfer(to_b.clone())).await);
    }
    for outcome in pending {
        let outcome = outcome.await;
        assert!(
            matches!(outcome, TransferOutcome::Completed(_)),
            "transfer failed: {:?}",
            outcome
        );
    }

    assert_eq!(read_account(&engine, alice, a).await.balance.value(), dec!(136.18));
    assert_eq!(read_account(&engine, bob, b).await.balance.value(), dec!(63.82));

    let (mut a_to_b, mut b_to_a) = (0, 0);
    for id in 1..=402 {
        let id = TransferId(id);
        match submit(|| engine.get_transfer(alice, id)).await.await {
            GetTransferOutcome::Found(transfer) => {
                assert_eq!(transfer.src_account_id, a);
                assert_eq!(transfer.amount.value(), dec!(0.17));
                a_to_b += 1;
                continue;
            }
            GetTransferOutcome::NotFound => {}
            other => panic!("unexpected outcome {:?}", other),
        }
        match submit(|| engine.get_transfer(bob, id)).await.await {
            GetTransferOutcome::Found(transfer) => {
                assert_eq!(transfer.src_account_id, b);
                assert_eq!(transfer.amount.value(), dec!(0.35));
                b_to_a += 1;
            }
            other => panic!("transfer {} missing: {:?}", id, other),
        }
    }
    assert_eq!((a_to_b, b_to_a), (201, 201));
    assert_eq!(store.transfer_count(), 402);

    engine.shutdown();
}

#[tokio::test]
async fn test_account_for_unknown_user_is_not_written() {
    let (store, handle) = shared(InMemoryStore::new());
    let engine = engine_with(handle, 2, 4);

    let outcome = engine.create_account(UserId(7), dec!(10)).unwrap().await;

    assert!(matches!(outcome, CreateAccountOutcome::UserNotFound));
    assert_eq!(store.account_count(), 0);
}

#[tokio::test]
async fn test_cross_user_transfer_audit_matches_accounts() {
    let engine = engine_with(shared(InMemoryStore::new()).1, 4, 8);
    let alice = new_user(&engine, "alice").await;
    let bob = new_user(&engine, "bob").await;
    let src = new_account(&engine, alice, dec!(50)).await;
    let dst = new_account(&engine, bob, dec!(20)).await;

    let id = match engine
        .transfer(request(alice, src, dst, dec!(12.5)))
        .unwrap()
        .await
    {
        TransferOutcome::Completed(id) => id,
        other => panic!("unexpected outcome {:?}", other),
    };

    let audit = match engine.get_transfer(alice, id).unwrap().await {
        GetTransferOutcome::Found(transfer) => transfer,
        other => panic!("unexpected outcome {:?}", other),
    };
    let src_now = read_account(&engine, alice, src).await;
    let dst_now = read_account(&engine, bob, dst).await;

    assert_eq!(audit.user_id, alice);
    assert_eq!(audit.src_before.value(), dec!(50));
    assert_eq!(audit.dst_before.value(), dec!(20));
    assert_eq!(audit.src_after, src_now.balance);
    assert_eq!(audit.dst_after, dst_now.balance);
    assert_eq!(
        audit.src_before.value() + audit.dst_before.value(),
        audit.src_after.value() + audit.dst_after.value()
    );

    // The recipient sees the balance, not the sender's audit row.
    assert!(matches!(
        engine.get_transfer(bob, id).unwrap().await,
        GetTransferOutcome::NotFound
    ));
}

#[tokio::test]
async fn test_wrong_owner_never_reveals_destination() {
    let engine = engine_with(shared(InMemoryStore::new()).1, 2, 4);
    let alice = new_user(&engine, "alice").await;
    let mallory = new_user(&engine, "mallory").await;
    let src = new_account(&engine, alice, dec!(5)).await;
    let real_dst = new_account(&engine, mallory, dec!(0)).await;

    let to_real = engine
        .transfer(request(mallory, src, real_dst, dec!(1)))
        .unwrap()
        .await;
    let to_missing = engine
        .transfer(request(mallory, src, AccountId(999), dec!(1)))
        .unwrap()
        .await;

    assert!(matches!(to_real, TransferOutcome::NotOwner));
    assert!(matches!(to_missing, TransferOutcome::NotOwner));
    assert_eq!(read_account(&engine, alice, src).await.balance.value(), dec!(5));
}

#[tokio::test]
async fn test_insufficient_funds_leaves_balances() {
    let engine = engine_with(shared(InMemoryStore::new()).1, 2, 4);
    let alice = new_user(&engine, "alice").await;
    let src = new_account(&engine, alice, dec!(0.34)).await;
    let dst = new_account(&engine, alice, dec!(1)).await;

    let outcome = engine
        .transfer(request(alice, src, dst, dec!(0.35)))
        .unwrap()
        .await;

    assert!(matches!(outcome, TransferOutcome::InsufficientFunds));
    assert_eq!(read_account(&engine, alice, src).await.balance.value(), dec!(0.34));
    assert_eq!(read_account(&engine, alice, dst).await.balance.value(), dec!(1));
}

#[tokio::test]
async fn test_repeated_reads_agree() {
    let engine = engine_with(shared(InMemoryStore::new()).1, 2, 4);
    let alice = new_user(&engine, "alice").await;
    let id = new_account(&engine, alice, dec!(42.42)).await;

    let first = read_account(&engine, alice, id).await;
    let second = read_account(&engine, alice, id).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_saturation_rejects_excess_without_side_effects() {
    const WORKERS: usize = 2;
    const QUEUE: usize = 3;

    let (store, handle) = shared(GatedStore::new());
    let engine = engine_with(handle, WORKERS, QUEUE);
    let closed = store.gate.write();

    let mut accepted = Vec::new();
    for i in 0..WORKERS {
        accepted.push(engine.create_user(format!("busy-{i}")).unwrap());
    }
    store.wait_entered(WORKERS);
    for i in 0..QUEUE {
        accepted.push(engine.create_user(format!("queued-{i}")).unwrap());
    }
    assert_eq!(engine.queued(), QUEUE);

    assert_eq!(
        engine.create_user("rejected").err(),
        Some(SubmitError::Saturated)
    );
    assert_eq!(
        engine.create_account(UserId(1), dec!(1)).err(),
        Some(SubmitError::Saturated)
    );

    drop(closed);
    for outcome in accepted {
        assert!(matches!(outcome.await, CreateUserOutcome::Created(_)));
    }
    assert_eq!(store.inner.user_count(), WORKERS + QUEUE);
    assert_eq!(store.inner.account_count(), 0);
}

#[tokio::test]
async fn test_burst_on_idle_engine_fills_workers_and_queue() {
    const WORKERS: usize = 10;
    const QUEUE: usize = 50;

    let (store, handle) = shared(GatedStore::new());
    let engine = engine_with(handle, WORKERS, QUEUE);
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    let closed = store.gate.write();

    let accepted: Vec<_> = (0..WORKERS + QUEUE)
        .map(|i| engine.create_user(format!("burst-{i}")))
        .collect();
    assert!(accepted.iter().all(Result::is_ok));
    assert_eq!(
        engine.create_user("overflow").err(),
        Some(SubmitError::Saturated)
    );

    drop(closed);
    for outcome in accepted {
        assert!(matches!(outcome.unwrap().await, CreateUserOutcome::Created(_)));
    }
    assert_eq!(store.inner.user_count(), WORKERS + QUEUE);
}

#[tokio::test]
async fn test_unavailable_store_reports_unexpected_errors() {
    let engine = engine_with(shared(FailingStore::unavailable()).1, 2, 4);

    assert!(matches!(
        engine.create_user("alice").unwrap().await,
        CreateUserOutcome::UnexpectedError(StoreError::Io(_))
    ));
    assert!(matches!(
        engine.get_account(UserId(1), AccountId(1)).unwrap().await,
        GetAccountOutcome::UnexpectedError(_)
    ));
    assert!(matches!(
        engine
            .transfer(request(UserId(1), AccountId(1), AccountId(2), dec!(1)))
            .unwrap()
            .await,
        TransferOutcome::UnexpectedError(_)
    ));
}

#[tokio::test]
async fn test_failing_statements_report_unexpected_errors() {
    let engine = engine_with(shared(FailingStore::broken()).1, 2, 4);

    assert!(matches!(
        engine.create_account(UserId(1), dec!(1)).unwrap().await,
        CreateAccountOutcome::UnexpectedError(StoreError::Io(_))
    ));
    assert!(matches!(
        engine.get_transfer(UserId(1), TransferId(1)).unwrap().await,
        GetTransferOutcome::UnexpectedError(_)
    ));
    assert!(matches!(
        engine
            .transfer(request(UserId(1), AccountId(1), AccountId(2), dec!(1)))
            .unwrap()
            .await,
        TransferOutcome::UnexpectedError(_)
    ));
}

#[tokio::test]
async fn test_random_transfers_conserve_funds() {
    let mut rng = StdRng::seed_from_u64(0x1ed6e7);
    let (store, handle) = shared(InMemoryStore::new());
    let engine = engine_with(handle, 8, 16);

    let mut accounts = Vec::new();
    for u in 0..3 {
        let user = new_user(&engine, &format!("user-{u}")).await;
        for _ in 0..2 {
            let balance = Decimal::new(rng.gen_range(0..5_000), 2);
            accounts.push((user, new_account(&engine, user, balance).await, balance));
        }
    }
    let total: Decimal = accounts.iter().map(|(_, _, balance)| *balance).sum();

    let mut pending = Vec::new();
    for _ in 0..300 {
        let src = rng.gen_range(0..accounts.len());
        let mut dst = rng.gen_range(0..accounts.len());
        while dst == src {
            dst = rng.gen_range(0..accounts.len());
        }
        // Mostly the owner, sometimes a stranger.
        let user = if rng.gen_bool(0.9) {
            accounts[src].0
        } else {
            accounts[dst].0
        };
        let amount = Decimal::new(rng.gen_range(1..2_000), 2);
        let call = request(user, accounts[src].1, accounts[dst].1, amount);
        pending.push(submit(|| engine.transfer(call.clone())).await);
    }

    let mut completed = Vec::new();
    for outcome in pending {
        match outcome.await {
            TransferOutcome::Completed(id) => completed.push(id),
            TransferOutcome::InsufficientFunds | TransferOutcome::NotOwner => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(store.transfer_count(), completed.len());

    let mut sum = Decimal::ZERO;
    for (owner, id, _) in &accounts {
        let balance = read_account(&engine, *owner, *id).await.balance.value();
        assert!(balance >= Decimal::ZERO);
        sum += balance;
    }
    assert_eq!(sum, total);

    let mut users: Vec<UserId> = accounts.iter().map(|(owner, _, _)| *owner).collect();
    users.dedup();
    for id in completed {
        let mut audit = None;
        for user in &users {
            if let GetTransferOutcome::Found(transfer) =
                submit(|| engine.get_transfer(*user, id)).await.await
            {
                audit = Some(transfer);
                break;
            }
        }
        let audit = audit.unwrap_or_else(|| panic!("transfer {} has no audit row", id));
        assert_eq!(
            audit.src_after.value(),
            audit.src_before.value() - audit.amount.value()
        );
        assert_eq!(
            audit.dst_after.value(),
            audit.dst_before.value() + audit.amount.value()
        );
    }
}
