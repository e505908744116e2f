//! Exercises the consumption/lifecycle contract against a real PostgreSQL.
//!
//! These are `#[ignore]`d so `cargo test` stays green on machines without a
//! database; run them with `cargo test -- --ignored` and a DATABASE_URL
//! pointing at a PostgreSQL the test harness may create databases on.

use chrono::{Duration, Utc};
use linkstrip_db::KeyError;
use linkstrip_db::models::api_key::{ApiKey, Plan};
use linkstrip_db::repositories::api_key_repo::ApiKeyRepository;
use linkstrip_db::repositories::usage_log_repo::UsageLogRepository;
use linkstrip_db::repositories::user_repo::UserRepository;
use sqlx::PgPool;

async fn seed_owner(pool: &PgPool) -> i64 {
    UserRepository::new(pool.clone())
        .create("owner@example.com", "not-a-real-hash", Some("Owner"), "user")
        .await
        .expect("seed user")
        .id
}

async fn seed_key(pool: &PgPool, quota: i32) -> ApiKey {
    let owner = seed_owner(pool).await;
    ApiKeyRepository::new(pool.clone())
        .create(owner, 32, 30, quota, Plan::Basic)
        .await
        .expect("seed key")
}

async fn force_expired(pool: &PgPool, key_id: i64, days_ago: i64) {
    sqlx::query("UPDATE api_keys SET expires_at = now() - make_interval(days => $1) WHERE id = $2")
        .bind(days_ago as i32)
        .bind(key_id)
        .execute(pool)
        .await
        .expect("force expiry");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn concurrent_consumers_never_oversell(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 5).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let repo = repo.clone();
        let token = key.token.clone();
        handles.push(tokio::spawn(async move {
            repo.consume(&token, Some("https://v.example/share/1"), 200).await
        }));
    }

    let mut succeeded = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(remaining) => {
                assert!(remaining >= 0);
                succeeded += 1;
            }
            Err(KeyError::QuotaExhausted) => exhausted += 1,
            Err(e) => panic!("unexpected failure: {e}"),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(exhausted, 15);

    let after = repo.get_by_id(key.id).await.unwrap().unwrap();
    assert_eq!(after.remaining_quota, 0);

    // Exactly one ledger row per successful decrement, none for rejections.
    let logged = UsageLogRepository::new(pool.clone())
        .count_for_token(&key.token)
        .await
        .unwrap();
    assert_eq!(logged, 5);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn sequential_consumption_counts_down_then_rejects(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 3).await;

    for expected in [2, 1, 0] {
        let remaining = repo.consume(&key.token, None, 200).await.unwrap();
        assert_eq!(remaining, expected);
    }

    assert!(matches!(
        repo.consume(&key.token, None, 200).await,
        Err(KeyError::QuotaExhausted)
    ));

    // The read path reports exhaustion the same way.
    assert!(matches!(
        repo.verify(&key.token).await,
        Err(KeyError::QuotaExhausted)
    ));

    let logged = UsageLogRepository::new(pool.clone())
        .count_for_token(&key.token)
        .await
        .unwrap();
    assert_eq!(logged, 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn expired_key_is_rejected_without_touching_quota(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 5).await;
    force_expired(&pool, key.id, 1).await;

    assert!(matches!(
        repo.consume(&key.token, None, 200).await,
        Err(KeyError::Expired)
    ));
    assert!(matches!(repo.verify(&key.token).await, Err(KeyError::Expired)));

    let after = repo.get_by_id(key.id).await.unwrap().unwrap();
    assert_eq!(after.remaining_quota, 5);

    let logged = UsageLogRepository::new(pool.clone())
        .count_for_token(&key.token)
        .await
        .unwrap();
    assert_eq!(logged, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn unknown_token_is_invalid(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    assert!(matches!(
        repo.consume("no-such-token", None, 200).await,
        Err(KeyError::InvalidToken)
    ));
    assert!(matches!(
        repo.verify("no-such-token").await,
        Err(KeyError::InvalidToken)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn renewing_an_expired_key_extends_from_now(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 5).await;
    force_expired(&pool, key.id, 5).await;

    let renewed = repo.renew(key.id, 10, 0).await.unwrap();

    let expected = Utc::now() + Duration::days(10);
    let drift = (renewed.expires_at - expected).num_seconds().abs();
    assert!(drift < 5, "expiry drifted {drift}s from now+10d");
    assert_eq!(renewed.total_quota, key.total_quota);
    assert_eq!(renewed.remaining_quota, key.remaining_quota);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn renewing_a_live_key_extends_from_its_expiry(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let owner = seed_owner(&pool).await;
    let key = repo.create(owner, 32, 20, 5, Plan::Pro).await.unwrap();

    let renewed = repo.renew(key.id, 10, 0).await.unwrap();

    let expected = key.expires_at + Duration::days(10);
    let drift = (renewed.expires_at - expected).num_seconds().abs();
    assert!(drift < 5, "expiry drifted {drift}s from expiry+10d");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn renew_with_quota_grants_both_counters(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 10).await;
    repo.consume(&key.token, None, 200).await.unwrap();

    let renewed = repo.renew(key.id, 7, 100).await.unwrap();
    assert_eq!(renewed.total_quota, 110);
    assert_eq!(renewed.remaining_quota, 109);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn top_up_leaves_used_amount_and_expiry_alone(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 100).await;
    repo.consume(&key.token, None, 200).await.unwrap();
    repo.consume(&key.token, None, 200).await.unwrap();

    let topped = repo.add_quota(key.id, 500).await.unwrap();
    assert_eq!(topped.total_quota, 600);
    assert_eq!(topped.remaining_quota, 598);
    // Amount already consumed is untouched.
    assert_eq!(
        topped.total_quota - topped.remaining_quota,
        key.total_quota - (key.remaining_quota - 2)
    );
    assert_eq!(topped.expires_at, key.expires_at);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn delete_cascades_ledger_and_invalidates_token(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let key = seed_key(&pool, 5).await;
    repo.consume(&key.token, Some("https://v.example/x"), 200).await.unwrap();

    repo.delete(key.id).await.unwrap();

    let logged = UsageLogRepository::new(pool.clone())
        .count_for_token(&key.token)
        .await
        .unwrap();
    assert_eq!(logged, 0);

    assert!(matches!(
        repo.verify(&key.token).await,
        Err(KeyError::InvalidToken)
    ));
    assert!(matches!(
        repo.consume(&key.token, None, 200).await,
        Err(KeyError::InvalidToken)
    ));

    assert!(matches!(repo.delete(key.id).await, Err(KeyError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a provisioned PostgreSQL (DATABASE_URL)"]
async fn lifecycle_arguments_are_validated(pool: PgPool) {
    let repo = ApiKeyRepository::new(pool.clone());
    let owner = seed_owner(&pool).await;
    let key = repo.create(owner, 32, 30, 10, Plan::Basic).await.unwrap();

    assert!(matches!(
        repo.create(owner, 32, 0, 10, Plan::Basic).await,
        Err(KeyError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.create(owner, 32, 30, 0, Plan::Basic).await,
        Err(KeyError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.create(owner, 4, 30, 10, Plan::Basic).await,
        Err(KeyError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.renew(key.id, 0, 0).await,
        Err(KeyError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.add_quota(key.id, 0).await,
        Err(KeyError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.renew(9_999_999, 10, 0).await,
        Err(KeyError::NotFound)
    ));
    assert!(matches!(
        repo.add_quota(9_999_999, 10).await,
        Err(KeyError::NotFound)
    ));
}
