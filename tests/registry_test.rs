use std::sync::Arc;

use ma_image_loader::engine::key::{derive_key, normalize_url, ContentKey};
use ma_image_loader::engine::registry::{Admission, FetchLease, InFlightRegistry, Subscription};
use ma_image_loader::error::FetchError;

fn key(url: &str) -> ContentKey {
    derive_key(&normalize_url(url).unwrap())
}

fn begin(registry: &Arc<InFlightRegistry>, k: &ContentKey, session: u64) -> FetchLease {
    match registry.try_begin_or_join(k, session) {
        Admission::Begin(lease) => lease,
        Admission::Joined(_) => panic!("session {} expected to begin", session),
    }
}

fn join(registry: &Arc<InFlightRegistry>, k: &ContentKey, session: u64) -> Subscription {
    match registry.try_begin_or_join(k, session) {
        Admission::Joined(sub) => sub,
        Admission::Begin(_) => panic!("session {} expected to join", session),
    }
}

#[tokio::test]
async fn test_registry_begin_then_join() {
    let registry = Arc::new(InFlightRegistry::new());
    let k = key("http://example.com/a.png");

    let lease = begin(&registry, &k, 1);
    let _sub2 = join(&registry, &k, 2);
    let _sub3 = join(&registry, &k, 3);

    assert!(registry.is_in_flight(&k));
    assert_eq!(registry.waiters(&k), vec![1, 2, 3]);

    let waiters = lease.complete(Ok(()));
    assert_eq!(waiters, vec![1, 2, 3]);
    assert!(!registry.is_in_flight(&k));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_fans_out_outcome() {
    let registry = Arc::new(InFlightRegistry::new());
    let k = key("http://example.com/b.png");

    let lease = begin(&registry, &k, 1);
    let mut sub_ok = join(&registry, &k, 2);
    let waiter = tokio::spawn(async move { sub_ok.wait().await });

    lease.complete(Ok(()));
    assert_eq!(waiter.await.unwrap(), Ok(()));

    // Next fetch for the same key fails; a joiner sees the error.
    let lease = begin(&registry, &k, 3);
    let mut sub_err = join(&registry, &k, 4);
    lease.complete(Err(FetchError::Status(500)));
    assert_eq!(sub_err.wait().await, Err(FetchError::Status(500)));
}

#[tokio::test]
async fn test_registry_keys_are_independent() {
    let registry = Arc::new(InFlightRegistry::new());
    let a = key("http://example.com/a.png");
    let b = key("http://example.com/b.png");

    let _lease_a = begin(&registry, &a, 1);
    let _lease_b = begin(&registry, &b, 2);
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_dropped_lease_completes_with_cancellation() {
    let registry = Arc::new(InFlightRegistry::new());
    let k = key("http://example.com/c.png");

    let lease = begin(&registry, &k, 1);
    let mut sub = join(&registry, &k, 2);

    drop(lease);

    assert!(!registry.is_in_flight(&k));
    assert_eq!(sub.wait().await, Err(FetchError::Cancelled));
}

#[tokio::test]
async fn test_leave_removes_only_the_joiner() {
    let registry = Arc::new(InFlightRegistry::new());
    let k = key("http://example.com/d.png");

    let lease = begin(&registry, &k, 1);
    let sub = join(&registry, &k, 2);
    let _sub3 = join(&registry, &k, 3);

    assert!(sub.leave());
    assert_eq!(registry.waiters(&k), vec![1, 3]);

    // The owner cannot leave its own fetch.
    assert!(!registry.leave(&k, 1));
    assert_eq!(lease.complete(Ok(())), vec![1, 3]);
}

#[tokio::test]
async fn test_dropped_subscription_leaves_waiter_list() {
    let registry = Arc::new(InFlightRegistry::new());
    let k = key("http://example.com/e.png");

    let lease = begin(&registry, &k, 1);
    let sub = join(&registry, &k, 2);
    let _sub3 = join(&registry, &k, 3);
    assert_eq!(registry.waiters(&k), vec![1, 2, 3]);

    drop(sub);
    assert_eq!(registry.waiters(&k), vec![1, 3]);

    // A subscription that already received its outcome leaves nothing behind.
    let waiters = lease.complete(Ok(()));
    assert_eq!(waiters, vec![1, 3]);
    let lease = begin(&registry, &k, 4);
    let mut done = join(&registry, &k, 5);
    let _late = join(&registry, &k, 6);
    drop(lease);
    assert_eq!(done.wait().await, Err(FetchError::Cancelled));
    drop(done);
    assert!(registry.is_empty());
}
