//! Membership-authority caching and the outgoing-notice path.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{tenant, DeadSink, RecordingSink, SwitchableDirectory};
use warden_core::{AdminRoster, CleanupLedger, CoreConfig, EventSink, Notifier, TenantCache};
use warden_store::StoreClient;
use warden_types::{Offender, VerifyOutcome, VerifyStatus};

const CHAT: i64 = -2002;
const ADMIN: i64 = 7;
const MEMBER: i64 = 8;

fn roster(directory: Arc<SwitchableDirectory>) -> AdminRoster {
    let config = CoreConfig::default();
    let cache = TenantCache::new(StoreClient::memory(), config.local_cache_ttl);
    AdminRoster::new(cache, directory, &config)
}

#[tokio::test]
async fn admin_list_is_fetched_once_then_cached() {
    let directory = Arc::new(SwitchableDirectory::new(vec![ADMIN]));
    let roster = roster(directory.clone());

    assert!(roster.is_admin(&tenant(), CHAT, ADMIN).await);
    assert!(!roster.is_admin(&tenant(), CHAT, MEMBER).await);
    assert!(roster.is_admin(&tenant(), CHAT, ADMIN).await);
    assert_eq!(directory.fetch_count(), 1);
}

#[tokio::test]
async fn invalidation_forces_a_refetch() {
    let directory = Arc::new(SwitchableDirectory::new(vec![ADMIN]));
    let roster = roster(directory.clone());

    assert!(roster.is_admin(&tenant(), CHAT, ADMIN).await);
    roster.invalidate(&tenant(), CHAT).await.unwrap();
    assert!(roster.is_admin(&tenant(), CHAT, ADMIN).await);
    assert_eq!(directory.fetch_count(), 2);
}

#[tokio::test]
async fn fetch_failure_degrades_to_not_admin_and_is_not_cached() {
    let directory = Arc::new(SwitchableDirectory::new(vec![ADMIN]));
    directory.healthy.store(false, Ordering::SeqCst);
    let roster = roster(directory.clone());

    // unreachable directory: the safe answer is "not admin"
    assert!(!roster.is_admin(&tenant(), CHAT, ADMIN).await);
    assert_eq!(roster.admins(&tenant(), CHAT).await, None);

    // recovery is immediate because the failure was never cached
    directory.healthy.store(true, Ordering::SeqCst);
    assert!(roster.is_admin(&tenant(), CHAT, ADMIN).await);
}

#[tokio::test]
async fn empty_admin_list_is_a_cached_answer() {
    let directory = Arc::new(SwitchableDirectory::new(vec![]));
    let roster = roster(directory.clone());

    assert_eq!(roster.admins(&tenant(), CHAT).await, Some(vec![]));
    assert!(!roster.is_admin(&tenant(), CHAT, MEMBER).await);
    // the empty list came from cache the second time
    assert_eq!(directory.fetch_count(), 1);
}

#[tokio::test]
async fn fraud_alerts_are_sent_and_tracked_for_cleanup() {
    let store = StoreClient::memory();
    let sink = Arc::new(RecordingSink::default());
    let tracker = CleanupLedger::new(store, &CoreConfig::default());
    let notifier = Notifier::new(sink.clone(), tracker.clone());

    let offenders = vec![
        Offender {
            user_id: 11,
            display_name: "Alice".to_string(),
        },
        Offender {
            user_id: 22,
            display_name: "Bob".to_string(),
        },
    ];
    let message_id = notifier
        .report_fraud(&tenant(), CHAT, "alice", &offenders)
        .await
        .unwrap()
        .expect("alert delivered");

    let sent = sink.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("@alice"));
    assert!(sent[0].1.contains("Alice") && sent[0].1.contains("Bob"));

    // the emitted alert is tracked, so a later bulk cleanup removes it
    assert_eq!(tracker.outstanding(&tenant(), CHAT).await.unwrap(), 1);
    let sink_for_drain = sink.clone();
    let report = tracker
        .drain_and_delete(&tenant(), CHAT, move |id| {
            let sink = sink_for_drain.clone();
            async move { sink.delete_event(CHAT, id).await }
        })
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(sink.deleted.lock().unwrap().as_slice(), &[(CHAT, message_id)]);
}

#[tokio::test]
async fn verification_notices_name_the_handle() {
    let store = StoreClient::memory();
    let sink = Arc::new(RecordingSink::default());
    let tracker = CleanupLedger::new(store, &CoreConfig::default());
    let notifier = Notifier::new(sink.clone(), tracker.clone());

    let outcome = VerifyOutcome {
        handle: Some("alice".to_string()),
        status: VerifyStatus::Verified,
    };
    notifier
        .report_verification(&tenant(), CHAT, 11, "Alice", &outcome)
        .await
        .unwrap()
        .expect("notice delivered");

    let repeat = VerifyOutcome {
        handle: None,
        status: VerifyStatus::AlreadyVerified,
    };
    notifier
        .report_verification(&tenant(), CHAT, 11, "Alice", &repeat)
        .await
        .unwrap()
        .expect("notice delivered");

    let sent = sink.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("@alice"));
    assert!(sent[1].1.contains("already verified"));
    assert_eq!(tracker.outstanding(&tenant(), CHAT).await.unwrap(), 2);
}

#[tokio::test]
async fn undeliverable_alerts_degrade_without_tracking() {
    let store = StoreClient::memory();
    let tracker = CleanupLedger::new(store, &CoreConfig::default());
    let notifier = Notifier::new(Arc::new(DeadSink), tracker.clone());

    let result = notifier
        .report_fraud(
            &tenant(),
            CHAT,
            "alice",
            &[Offender {
                user_id: 11,
                display_name: "Alice".to_string(),
            }],
        )
        .await
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(tracker.outstanding(&tenant(), CHAT).await.unwrap(), 0);
}
