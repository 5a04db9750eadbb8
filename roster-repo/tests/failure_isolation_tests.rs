//! Behaviour of the repository when one backend is unavailable.
//!
//! Operations that do not touch the failing backend keep working; operations
//! that do surface that backend's error unchanged.

use roster_repo::{collect_people, ChangeEmitter, PersonRepository};
use roster_storage::LookupCache;
use roster_test_utils::assertions::*;
use roster_test_utils::fixtures::{alice, bob, TestBackends};

fn repository(backends: &TestBackends) -> PersonRepository {
    PersonRepository::new(
        backends.store.clone(),
        backends.cache.clone(),
        ChangeEmitter::with_defaults(backends.publisher.clone()),
    )
}

#[tokio::test]
async fn test_store_down_cache_and_stream_still_work() {
    let backends = TestBackends::new();
    let repo = repository(&backends);
    backends.store_fault.fail();

    assert_connection_failure(&repo.save(&alice()).await);
    assert_connection_failure(&repo.read_by_login("alice").await);
    assert_connection_failure(&repo.read_all().await.map(|_| ()));
    assert_connection_failure(&repo.search(Some("A"), None).await.map(|_| ()));
    assert_connection_failure(&repo.warm_up_cache().await);
    assert_connection_failure(&repo.delete("alice").await);

    assert_ok(&repo.save_to_cache(&alice()).await);
    assert_eq!(repo.read_from_cache_by_login("alice").await.unwrap(), alice());
    assert_ok(&repo.publish(&alice()).await);
    assert_eq!(backends.delivered.delivered().await.len(), 1);
}

#[tokio::test]
async fn test_store_down_read_through_serves_cache_hits() {
    let backends = TestBackends::new();
    let repo = repository(&backends);
    repo.save_to_cache(&alice()).await.unwrap();
    backends.store_fault.fail();

    assert_eq!(repo.read_through("alice").await.unwrap(), Some(alice()));
    assert_connection_failure(&repo.read_through("bob").await);
}

#[tokio::test]
async fn test_cache_down_store_and_stream_still_work() {
    let backends = TestBackends::new();
    let repo = repository(&backends);
    backends.cache_fault.fail();

    assert_ok(&repo.save(&alice()).await);
    assert_eq!(repo.read_by_login("alice").await.unwrap(), Some(alice()));
    let all = collect_people(repo.read_all().await.unwrap()).await.unwrap();
    assert_eq!(all, vec![alice()]);
    assert_ok(&repo.publish(&alice()).await);

    assert_cache_backend_error(&repo.save_to_cache(&bob()).await);
    assert_cache_backend_error(&repo.read_from_cache_by_login("alice").await);
    assert_cache_backend_error(&repo.read_through("alice").await);
    assert_cache_backend_error(&repo.size_of_cache().await);
    assert_cache_backend_error(&repo.warm_up_cache().await);
}

#[tokio::test]
async fn test_stream_down_store_and_cache_still_work() {
    let backends = TestBackends::new();
    let repo = repository(&backends);
    backends.publish_fault.fail();

    assert_ok(&repo.save(&alice()).await);
    assert_ok(&repo.save_to_cache(&alice()).await);
    assert_eq!(repo.read_through("alice").await.unwrap(), Some(alice()));
    assert_eq!(repo.warm_up_cache().await.unwrap().entries, 1);

    assert_publish_error(&repo.publish(&alice()).await);
}

#[tokio::test]
async fn test_save_through_with_cache_down_leaves_row_committed() {
    let backends = TestBackends::new();
    let repo = repository(&backends);
    backends.cache_fault.fail();

    assert_cache_backend_error(&repo.save_through(&alice()).await);
    assert_eq!(repo.read_by_login("alice").await.unwrap(), Some(alice()));
    assert!(backends.delivered.delivered().await.is_empty());

    backends.cache_fault.recover();
    assert_eq!(repo.size_of_cache().await.unwrap(), 0);
}

#[tokio::test]
async fn test_save_through_with_stream_down_leaves_row_and_cache_entry() {
    let backends = TestBackends::new();
    let repo = repository(&backends);
    backends.publish_fault.fail();

    assert_publish_error(&repo.save_through(&alice()).await);
    assert_eq!(repo.read_by_login("alice").await.unwrap(), Some(alice()));
    assert_eq!(repo.read_from_cache_by_login("alice").await.unwrap(), alice());
    assert!(backends.delivered.delivered().await.is_empty());
}

#[tokio::test]
async fn test_recovered_backend_resumes() {
    let backends = TestBackends::new();
    let repo = repository(&backends);

    backends.store_fault.fail();
    assert_connection_failure(&repo.save(&alice()).await);
    backends.store_fault.recover();

    assert_ok(&repo.save(&alice()).await);
    assert_eq!(backends.entries.size().await.unwrap(), 0);
}
