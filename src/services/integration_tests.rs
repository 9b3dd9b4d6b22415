//! PostgreSQL integration tests for the money-moving services.
//!
//! These tests run against a real PostgreSQL database.
//! They are marked #[ignore] by default and should be run explicitly:
//!
//!   cargo test integration_tests -- --ignored
//!
//! Requires:
//!   - PostgreSQL reachable at TEST_DATABASE_URL (or the default in test_utils)
//!   - Migrations are applied on connect

use serde_json::json;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        advance::{STATUS_DISBURSED, STATUS_REPAID},
        pocket::CreatePocketRequest,
        recipient::{CreateRecipientRequest, TransferRequest},
        transaction::{Direction, Transaction, TransactionKind, TransactionStatus},
        webhook::PaymentEvent,
    },
    services::{
        advance_service,
        ledger_service::{self, LedgerEntry},
        payments_service,
        pocket_service::{self, PocketMove},
        recipient_service,
        risk::AdvancePolicy,
        webhook_service::{self, EventOutcome},
    },
    test_utils::{
        balance_of, funded_profile,
        mocks::{FakePaymentProcessor, TransferOutcome},
        test_pool,
    },
};

async fn transaction_by_key(pool: &DbPool, key: &str) -> Option<Transaction> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .unwrap()
}

async fn transaction_by_id(pool: &DbPool, id: Uuid) -> Transaction {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn notification_count(pool: &DbPool, profile_id: Uuid, title: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE profile_id = $1 AND title = $2")
        .bind(profile_id)
        .bind(title)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn unique_key(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

// ============================================================================
// Ledger
// ============================================================================

mod ledger_tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn replayed_key_has_no_balance_effect() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 0).await;
        let key = unique_key("credit");

        let entry = LedgerEntry::new(
            profile.id,
            TransactionKind::Deposit,
            Direction::Credit,
            1_500,
        )
        .idempotency_key(Some(key.clone()));

        let first = ledger_service::apply(&pool, entry.clone()).await.unwrap();
        let second = ledger_service::apply(&pool, entry).await.unwrap();

        assert!(!first.is_replay());
        assert!(second.is_replay());
        assert_eq!(first.into_inner().id, second.into_inner().id);
        assert_eq!(balance_of(&pool, profile.id).await, 1_500);
    }

    #[tokio::test]
    #[ignore]
    async fn debit_never_goes_below_zero() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 1_000).await;
        let key = unique_key("overdraft");

        let entry = LedgerEntry::new(
            profile.id,
            TransactionKind::TransferOut,
            Direction::Debit,
            1_001,
        )
        .idempotency_key(Some(key.clone()));

        let result = ledger_service::apply(&pool, entry).await;

        assert!(matches!(result, Err(AppError::InsufficientBalance)));
        assert_eq!(balance_of(&pool, profile.id).await, 1_000);
        // The ledger row was rolled back with the failed update
        assert!(transaction_by_key(&pool, &key).await.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn reversal_refunds_once() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 5_000).await;

        let debit = LedgerEntry::new(
            profile.id,
            TransactionKind::Withdrawal,
            Direction::Debit,
            3_000,
        );
        let debit = ledger_service::apply(&pool, debit).await.unwrap().into_inner();
        assert_eq!(balance_of(&pool, profile.id).await, 2_000);

        let mut conn = pool.acquire().await.unwrap();
        let first = ledger_service::reverse_debit(&mut *conn, debit.id, "test")
            .await
            .unwrap();
        let second = ledger_service::reverse_debit(&mut *conn, debit.id, "test")
            .await
            .unwrap();
        drop(conn);

        assert_eq!(first.map(|t| t.amount_cents), Some(3_000));
        assert!(second.is_none());
        assert_eq!(balance_of(&pool, profile.id).await, 5_000);
        assert_eq!(
            transaction_by_id(&pool, debit.id).await.status,
            TransactionStatus::Failed.as_str()
        );
    }

    #[tokio::test]
    #[ignore]
    async fn partial_reversals_credit_the_difference() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 5_000).await;

        let debit = LedgerEntry::new(
            profile.id,
            TransactionKind::Withdrawal,
            Direction::Debit,
            4_000,
        );
        let debit = ledger_service::apply(&pool, debit).await.unwrap().into_inner();

        let mut conn = pool.acquire().await.unwrap();
        let partial = ledger_service::reverse_debit_up_to(&mut *conn, debit.id, "test", Some(1_500))
            .await
            .unwrap();
        let repeated = ledger_service::reverse_debit_up_to(&mut *conn, debit.id, "test", Some(1_500))
            .await
            .unwrap();
        let rest = ledger_service::reverse_debit_up_to(&mut *conn, debit.id, "test", Some(4_000))
            .await
            .unwrap();
        drop(conn);

        assert_eq!(partial.map(|t| t.amount_cents), Some(1_500));
        assert!(repeated.is_none());
        assert_eq!(rest.map(|t| t.amount_cents), Some(2_500));
        assert_eq!(balance_of(&pool, profile.id).await, 5_000);
        assert_eq!(
            transaction_by_id(&pool, debit.id).await.status,
            TransactionStatus::Failed.as_str()
        );
    }
}

// ============================================================================
// Internal transfers
// ============================================================================

mod transfer_tests {
    use super::*;

    async fn linked_recipient(pool: &DbPool, sender: Uuid, receiver_email: &str) -> Uuid {
        recipient_service::create_recipient(
            pool,
            sender,
            CreateRecipientRequest {
                name: "Friend".to_string(),
                email: receiver_email.to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    fn transfer(recipient_id: Uuid, amount_cents: i64, key: &str) -> TransferRequest {
        TransferRequest {
            recipient_id,
            amount_cents,
            description: None,
            idempotency_key: Some(key.to_string()),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn replayed_transfer_moves_money_once() {
        let pool = test_pool().await;
        let (sender, _) = funded_profile(&pool, 10_000).await;
        let (receiver, _) = funded_profile(&pool, 0).await;
        let recipient_id = linked_recipient(&pool, sender.id, &receiver.email).await;

        let first =
            recipient_service::send_to_recipient(&pool, sender.id, transfer(recipient_id, 2_500, "rent"))
                .await
                .unwrap();
        let second =
            recipient_service::send_to_recipient(&pool, sender.id, transfer(recipient_id, 2_500, "rent"))
                .await
                .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(balance_of(&pool, sender.id).await, 7_500);
        assert_eq!(balance_of(&pool, receiver.id).await, 2_500);
    }

    #[tokio::test]
    #[ignore]
    async fn sender_key_cannot_collide_with_receiver_entry() {
        let pool = test_pool().await;
        let (sender, _) = funded_profile(&pool, 10_000).await;
        let (receiver, _) = funded_profile(&pool, 0).await;
        let recipient_id = linked_recipient(&pool, sender.id, &receiver.email).await;

        recipient_service::send_to_recipient(&pool, sender.id, transfer(recipient_id, 1_000, "k"))
            .await
            .unwrap();
        recipient_service::send_to_recipient(&pool, sender.id, transfer(recipient_id, 1_000, "k:in"))
            .await
            .unwrap();

        assert_eq!(balance_of(&pool, sender.id).await, 8_000);
        assert_eq!(balance_of(&pool, receiver.id).await, 2_000);
    }

    #[tokio::test]
    #[ignore]
    async fn unlinked_recipient_is_rejected() {
        let pool = test_pool().await;
        let (sender, _) = funded_profile(&pool, 10_000).await;
        let recipient_id = linked_recipient(&pool, sender.id, "nobody-here@example.com").await;

        let result =
            recipient_service::send_to_recipient(&pool, sender.id, transfer(recipient_id, 100, "x"))
                .await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert_eq!(balance_of(&pool, sender.id).await, 10_000);
    }
}

// ============================================================================
// Pockets
// ============================================================================

mod pocket_tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn moves_are_atomic_and_idempotent() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 10_000).await;
        let pocket = pocket_service::create_pocket(
            &pool,
            profile.id,
            CreatePocketRequest {
                name: "Holiday".to_string(),
                goal_cents: Some(50_000),
            },
        )
        .await
        .unwrap();

        let key = Some("save-1".to_string());
        let moved = pocket_service::move_funds(
            &pool,
            profile.id,
            pocket.id,
            PocketMove::Deposit,
            4_000,
            key.clone(),
        )
        .await
        .unwrap();
        let replayed = pocket_service::move_funds(
            &pool,
            profile.id,
            pocket.id,
            PocketMove::Deposit,
            4_000,
            key,
        )
        .await
        .unwrap();

        assert_eq!(moved.balance_cents, 4_000);
        assert_eq!(replayed.balance_cents, 4_000);
        assert_eq!(balance_of(&pool, profile.id).await, 6_000);

        let overdrawn = pocket_service::move_funds(
            &pool,
            profile.id,
            pocket.id,
            PocketMove::Withdraw,
            5_000,
            None,
        )
        .await;

        assert!(matches!(overdrawn, Err(AppError::InsufficientBalance)));
        assert_eq!(balance_of(&pool, profile.id).await, 6_000);
    }
}

// ============================================================================
// Emergency advances
// ============================================================================

mod advance_tests {
    use super::*;

    fn policy() -> AdvancePolicy {
        AdvancePolicy {
            max_amount_cents: 50_000,
            min_account_age_days: 0,
            income_multiplier: 0,
        }
    }

    async fn open_advances(pool: &DbPool, profile_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM advances WHERE profile_id = $1 AND status = $2")
            .bind(profile_id)
            .bind(STATUS_DISBURSED)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn disburse_replay_and_repay() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 1_000).await;

        let (advance, created) = advance_service::request_advance(
            &pool,
            &policy(),
            profile.id,
            20_000,
            Some("adv-1".to_string()),
        )
        .await
        .unwrap();
        assert!(created);
        assert_eq!(balance_of(&pool, profile.id).await, 21_000);

        let (replayed, created) = advance_service::request_advance(
            &pool,
            &policy(),
            profile.id,
            20_000,
            Some("adv-1".to_string()),
        )
        .await
        .unwrap();
        assert!(!created);
        assert_eq!(replayed.id, advance.id);
        assert_eq!(balance_of(&pool, profile.id).await, 21_000);

        let repaid = advance_service::repay(&pool, profile.id, advance.id)
            .await
            .unwrap();
        let repaid_again = advance_service::repay(&pool, profile.id, advance.id)
            .await
            .unwrap();

        assert_eq!(repaid.status, STATUS_REPAID);
        assert_eq!(repaid_again.status, STATUS_REPAID);
        assert_eq!(balance_of(&pool, profile.id).await, 1_000);
    }

    #[tokio::test]
    #[ignore]
    async fn at_most_one_open_advance_under_concurrency() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 0).await;
        let policy = policy();

        let (a, b) = tokio::join!(
            advance_service::request_advance(
                &pool,
                &policy,
                profile.id,
                10_000,
                Some("race-a".to_string())
            ),
            advance_service::request_advance(
                &pool,
                &policy,
                profile.id,
                10_000,
                Some("race-b".to_string())
            ),
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        for result in [a, b] {
            if let Err(e) = result {
                assert!(matches!(
                    e,
                    AppError::AdvanceOutstanding | AppError::AdvanceDeclined(_)
                ));
            }
        }
        assert_eq!(open_advances(&pool, profile.id).await, 1);
        assert_eq!(balance_of(&pool, profile.id).await, 10_000);
    }

    #[tokio::test]
    #[ignore]
    async fn declined_advance_moves_nothing() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 0).await;

        let result = advance_service::request_advance(
            &pool,
            &policy(),
            profile.id,
            60_000,
            Some("too-big".to_string()),
        )
        .await;

        assert!(matches!(result, Err(AppError::AdvanceDeclined(_))));
        assert_eq!(open_advances(&pool, profile.id).await, 0);
        assert_eq!(balance_of(&pool, profile.id).await, 0);
    }
}

// ============================================================================
// Withdrawals
// ============================================================================

mod withdrawal_tests {
    use super::*;

    async fn payout_method(pool: &DbPool, payments: &FakePaymentProcessor, profile_id: Uuid) -> Uuid {
        payments_service::vault_card(pool, payments, profile_id, &unique_key("tok"))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    #[ignore]
    async fn successful_withdrawal_settles_with_transfer_id() {
        let pool = test_pool().await;
        let payments = FakePaymentProcessor::new();
        let (profile, _) = funded_profile(&pool, 10_000).await;
        let method = payout_method(&pool, &payments, profile.id).await;

        let applied =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method, 4_000, "w1")
                .await
                .unwrap();

        let settled = applied.into_inner();
        assert_eq!(settled.status, TransactionStatus::Completed.as_str());
        assert!(settled.processor_ref.is_some());
        assert_eq!(balance_of(&pool, profile.id).await, 6_000);
    }

    #[tokio::test]
    #[ignore]
    async fn rejected_transfer_is_compensated_once() {
        let pool = test_pool().await;
        let payments = FakePaymentProcessor::new().with_transfer_outcomes(&[TransferOutcome::Reject]);
        let (profile, _) = funded_profile(&pool, 10_000).await;
        let method = payout_method(&pool, &payments, profile.id).await;

        let first =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method, 5_000, "k1").await;
        assert!(matches!(first, Err(AppError::Payments(_))));
        assert_eq!(balance_of(&pool, profile.id).await, 10_000);

        let retried =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method, 5_000, "k1")
                .await
                .unwrap();

        assert!(retried.is_replay());
        assert_eq!(
            retried.into_inner().status,
            TransactionStatus::Failed.as_str()
        );
        assert_eq!(payments.transfers().len(), 1);
        assert_eq!(balance_of(&pool, profile.id).await, 10_000);
        assert_eq!(notification_count(&pool, profile.id, "Withdrawal failed").await, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn unknown_outcome_keeps_funds_reserved_until_retry() {
        let pool = test_pool().await;
        let payments = FakePaymentProcessor::new().with_transfer_outcomes(&[TransferOutcome::Garble]);
        let (profile, _) = funded_profile(&pool, 10_000).await;
        let method = payout_method(&pool, &payments, profile.id).await;

        let first =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method, 5_000, "k1").await;
        assert!(matches!(first, Err(AppError::Payments(_))));
        // No refund: the processor may have sent the money
        assert_eq!(balance_of(&pool, profile.id).await, 5_000);

        let key = format!("withdrawal:{}:k1", profile.id);
        let pending = transaction_by_key(&pool, &key).await.unwrap();
        assert_eq!(pending.status, TransactionStatus::Pending.as_str());

        let retried =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method, 5_000, "k1")
                .await
                .unwrap();

        let settled = retried.into_inner();
        assert_eq!(settled.id, pending.id);
        assert_eq!(settled.status, TransactionStatus::Completed.as_str());
        assert_eq!(balance_of(&pool, profile.id).await, 5_000);

        let transfers = payments.transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].idempotency_key, transfers[1].idempotency_key);
    }

    #[tokio::test]
    #[ignore]
    async fn overdraft_never_reaches_the_processor() {
        let pool = test_pool().await;
        let payments = FakePaymentProcessor::new();
        let (profile, _) = funded_profile(&pool, 1_000).await;
        let method = payout_method(&pool, &payments, profile.id).await;

        let result =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method, 5_000, "big")
                .await;

        assert!(matches!(result, Err(AppError::InsufficientBalance)));
        assert!(payments.transfers().is_empty());
        assert_eq!(balance_of(&pool, profile.id).await, 1_000);
    }
}

// ============================================================================
// Webhook reconciliation
// ============================================================================

mod webhook_tests {
    use super::*;

    fn intent_event(event_id: &str, profile_id: Uuid, intent_id: &str, amount: i64) -> PaymentEvent {
        serde_json::from_value(json!({
            "id": event_id,
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": intent_id,
                "amount_received": amount,
                "currency": "usd",
                "metadata": { "profile_id": profile_id.to_string(), "flow": "intent" }
            }}
        }))
        .unwrap()
    }

    fn reversal_event(event_id: &str, transfer_id: &str, amount_reversed: i64) -> PaymentEvent {
        serde_json::from_value(json!({
            "id": event_id,
            "type": "transfer.reversed",
            "data": { "object": {
                "id": transfer_id,
                "amount": 5_000,
                "amount_reversed": amount_reversed
            }}
        }))
        .unwrap()
    }

    async fn is_recorded(pool: &DbPool, event_id: &str) -> bool {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_webhook_events WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn duplicate_event_is_acknowledged_without_effect() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 0).await;
        let event = intent_event(&unique_key("evt"), profile.id, &unique_key("pi"), 2_500);

        let first = webhook_service::process_event(&pool, &event).await.unwrap();
        let second = webhook_service::process_event(&pool, &event).await.unwrap();

        assert_eq!(first, EventOutcome::Applied);
        assert_eq!(second, EventOutcome::Duplicate);
        assert_eq!(balance_of(&pool, profile.id).await, 2_500);
    }

    #[tokio::test]
    #[ignore]
    async fn same_payment_in_two_events_credits_once() {
        let pool = test_pool().await;
        let (profile, _) = funded_profile(&pool, 0).await;
        let intent_id = unique_key("pi");

        let first = intent_event(&unique_key("evt"), profile.id, &intent_id, 2_500);
        let resent = intent_event(&unique_key("evt"), profile.id, &intent_id, 2_500);

        webhook_service::process_event(&pool, &first).await.unwrap();
        webhook_service::process_event(&pool, &resent).await.unwrap();

        assert_eq!(balance_of(&pool, profile.id).await, 2_500);
    }

    #[tokio::test]
    #[ignore]
    async fn deposit_for_unknown_profile_is_recorded_and_ignored() {
        let pool = test_pool().await;
        let event_id = unique_key("evt");
        let event = intent_event(&event_id, Uuid::new_v4(), &unique_key("pi"), 2_500);

        let outcome = webhook_service::process_event(&pool, &event).await.unwrap();

        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(is_recorded(&pool, &event_id).await);
        assert_eq!(
            webhook_service::process_event(&pool, &event).await.unwrap(),
            EventOutcome::Duplicate
        );
    }

    #[tokio::test]
    #[ignore]
    async fn partial_then_full_reversal_refunds_the_transfer_amount() {
        let pool = test_pool().await;
        let payments = FakePaymentProcessor::new();
        let (profile, _) = funded_profile(&pool, 10_000).await;
        let method = payments_service::vault_card(&pool, &payments, profile.id, &unique_key("tok"))
            .await
            .unwrap();
        let withdrawal =
            payments_service::withdraw(&pool, &payments, 100, profile.id, method.id, 5_000, "w")
                .await
                .unwrap()
                .into_inner();
        let transfer_id = withdrawal.processor_ref.clone().unwrap();
        assert_eq!(balance_of(&pool, profile.id).await, 5_000);

        for (amount_reversed, expected_balance) in [(2_000, 7_000), (2_000, 7_000), (5_000, 10_000)] {
            let event = reversal_event(&unique_key("evt"), &transfer_id, amount_reversed);
            let outcome = webhook_service::process_event(&pool, &event).await.unwrap();
            assert_eq!(outcome, EventOutcome::Applied);
            assert_eq!(balance_of(&pool, profile.id).await, expected_balance);
        }

        assert_eq!(
            transaction_by_id(&pool, withdrawal.id).await.status,
            TransactionStatus::Failed.as_str()
        );
    }
}

// ============================================================================
// Router with fake vendors
// ============================================================================

mod router_tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        routes::build_router,
        test_utils::{
            fake_state,
            mocks::{FakeEmailSender, FakePaymentProcessor},
            unique_email,
        },
    };

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn sign_up_then_use_vendor_pass_throughs() {
        let pool = test_pool().await;
        let email = Arc::new(FakeEmailSender::new());
        let app = build_router(fake_state(
            pool,
            Arc::new(FakePaymentProcessor::new()),
            email.clone(),
        ));

        let signup = app
            .clone()
            .oneshot(
                Request::post("/api/v1/profiles")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({ "email": unique_email("router"), "full_name": "Ada" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(signup.status(), StatusCode::CREATED);
        let token = json_body(signup).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let completion = app
            .clone()
            .oneshot(
                Request::post("/api/v1/ai/complete")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "prompt": "hello" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(completion.status(), StatusCode::OK);
        assert_eq!(json_body(completion).await["text"], "echo: hello");

        let statement = app
            .oneshot(
                Request::post("/api/v1/emails/statement")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(statement.status(), StatusCode::OK);
        assert_eq!(json_body(statement).await["message_id"], "msg_1");

        let sent = email.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("No recent activity."));
    }
}
