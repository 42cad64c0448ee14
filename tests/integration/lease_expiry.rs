//! Lease expiry integration tests.
//!
//! These tests verify that a task whose worker goes silent is handed out
//! again, and that the silent worker's late report is rejected.

use std::time::{Duration, Instant};

use calcflow::core::{ExpressionStatus, TaskReport};
use calcflow::orchestration::{LeaseSweeper, WorkerProtocol};
use calcflow::Error;

use crate::fixtures::{compute, drain, store_with_lease};

/// Test: Expiry requeues and the late report is stale
/// Given a dispatched task whose lease runs out
/// When the operation is redispatched and both workers report
/// Then the new report is applied and the old one is UnknownOperation
#[tokio::test]
async fn test_expired_lease_redispatches() {
    let store = store_with_lease(Duration::from_millis(100));
    let protocol = WorkerProtocol::new(store.clone());
    let id = store.submit("6*7").await.unwrap();
    let start = Instant::now();

    let lost = store.dispatch_at(start).await.unwrap();
    assert_eq!(store.requeue_expired_at(start + Duration::from_millis(99)).await, 0);
    assert_eq!(store.requeue_expired_at(start + Duration::from_millis(100)).await, 1);

    let retry = protocol.request_task().await.unwrap();
    assert_eq!(retry.operation_id, lost.operation_id);
    assert_ne!(retry.id, lost.id);

    protocol.submit_result(compute(&retry)).await.unwrap();

    let late = TaskReport::value(lost.id, 1.0);
    assert!(matches!(
        protocol.submit_result(late).await,
        Err(Error::UnknownOperation(_))
    ));

    let expr = store.get_expression(&id).await.unwrap();
    assert_eq!(expr.result, Some(42.0));
}

/// Test: Late report before redispatch is still stale
/// Given an expired lease that has been requeued but not yet handed out
/// When the original worker reports
/// Then the report is rejected and the operation stays ready
#[tokio::test]
async fn test_late_report_after_requeue_rejected() {
    let store = store_with_lease(Duration::from_millis(10));
    let protocol = WorkerProtocol::new(store.clone());
    store.submit("1+2").await.unwrap();
    let start = Instant::now();

    let lost = store.dispatch_at(start).await.unwrap();
    store.requeue_expired_at(start + Duration::from_secs(1)).await;

    assert!(matches!(
        protocol.submit_result(compute(&lost)).await,
        Err(Error::UnknownOperation(_))
    ));
    assert_eq!(store.stats().await.ready_operations, 1);
    assert_eq!(drain(&protocol).await.len(), 1);
}

/// Test: Requeued operations go to the tail
/// Given an expired lease and another ready operation
/// When the expired one is requeued
/// Then the other operation is dispatched first
#[tokio::test]
async fn test_requeue_appends_to_tail() {
    let store = store_with_lease(Duration::from_millis(10));
    let a = store.submit("1+1").await.unwrap();
    let start = Instant::now();
    let lost = store.dispatch_at(start).await.unwrap();
    assert_eq!(lost.expression_id, a);

    let b = store.submit("2+2").await.unwrap();
    store.requeue_expired_at(start + Duration::from_secs(1)).await;

    assert_eq!(store.dispatch().await.unwrap().expression_id, b);
    assert_eq!(store.dispatch().await.unwrap().expression_id, a);
}

/// Test: Expiry does not touch finished work
/// Given a task reported just before its lease would expire
/// When the sweep runs
/// Then nothing is requeued
#[tokio::test]
async fn test_completed_task_not_requeued() {
    let store = store_with_lease(Duration::from_millis(10));
    let protocol = WorkerProtocol::new(store.clone());
    let id = store.submit("3-1").await.unwrap();
    let start = Instant::now();

    let task = store.dispatch_at(start).await.unwrap();
    protocol.submit_result(compute(&task)).await.unwrap();

    assert_eq!(store.requeue_expired_at(start + Duration::from_secs(1)).await, 0);
    assert_eq!(
        store.get_expression(&id).await.unwrap().status,
        ExpressionStatus::Done
    );
}

/// Test: Background sweeper recovers a lost worker
/// Given a running LeaseSweeper and a task nobody reports
/// When the lease runs out
/// Then another worker can finish the expression
#[tokio::test]
async fn test_sweeper_recovers_lost_worker() {
    let store = store_with_lease(Duration::from_millis(30));
    let protocol = WorkerProtocol::new(store.clone());
    let id = store.submit("(2+3)*4").await.unwrap();

    let sweeper = LeaseSweeper::new(store.clone())
        .with_interval(Duration::from_millis(10))
        .spawn();

    let _lost = protocol.request_task().await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        drain(&protocol).await;
        if store.get_expression(&id).await.unwrap().is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sweeper.shutdown();

    let expr = store.get_expression(&id).await.unwrap();
    assert_eq!(expr.status, ExpressionStatus::Done);
    assert_eq!(expr.result, Some(20.0));

    let ops = store.operations(&id).await.unwrap();
    assert_eq!(ops[0].dispatch_count, 2);
    assert_eq!(ops[1].dispatch_count, 1);
}
