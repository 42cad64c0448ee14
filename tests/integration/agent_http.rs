//! Agent workers against a live orchestrator.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use calcflow::agent::Agent;
use calcflow::core::{ExpressionId, ExpressionStatus, TaskReport};
use calcflow::Error;

use crate::fixtures::{test_store, TestServer};

const POLL: Duration = Duration::from_millis(10);

async fn wait_finished(server: &TestServer, ids: &[ExpressionId]) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let mut finished = 0;
        for id in ids {
            if server.store.get_expression(id).await.unwrap().is_finished() {
                finished += 1;
            }
        }
        if finished == ids.len() {
            return;
        }
        assert!(Instant::now() < deadline, "expressions did not finish in time");
        tokio::time::sleep(POLL).await;
    }
}

/// Test: Agent evaluates expressions over HTTP
/// Given a live server with several expressions
/// When an agent with two workers runs
/// Then every expression finishes with the expected result
#[tokio::test]
async fn test_agent_drives_expressions_to_completion() {
    let server = TestServer::start(test_store()).await;
    let mut ids = Vec::new();
    for source in ["3+4*2", "(1+2)*(3+4)", "-(8-2)/3", "2*2*2*2"] {
        ids.push(server.store.submit(source).await.unwrap());
    }

    let cancel = CancellationToken::new();
    let agent = Agent::new(&server.url(), 2).with_poll_interval(POLL);
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { agent.run(cancel).await }
    });

    wait_finished(&server, &ids).await;
    cancel.cancel();
    running.await.unwrap();

    let mut results = Vec::new();
    for id in &ids {
        let expr = server.store.get_expression(id).await.unwrap();
        assert_eq!(expr.status, ExpressionStatus::Done);
        results.push(expr.result);
    }
    assert_eq!(results, vec![Some(11.0), Some(21.0), Some(-2.0), Some(16.0)]);

    server.stop().await;
}

/// Test: Agent reports runtime division by zero
#[tokio::test]
async fn test_agent_reports_division_failure() {
    let server = TestServer::start(test_store()).await;
    let id = server.store.submit("1/(2-2)").await.unwrap();

    let cancel = CancellationToken::new();
    let agent = Agent::new(&server.url(), 1).with_poll_interval(POLL);
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { agent.run(cancel).await }
    });

    wait_finished(&server, &[id]).await;
    cancel.cancel();
    running.await.unwrap();

    let expr = server.store.get_expression(&id).await.unwrap();
    assert_eq!(expr.status, ExpressionStatus::Failed);
    assert!(expr.error.unwrap().contains("division by zero"));

    server.stop().await;
}

/// Test: Client calls map server responses
/// Given an empty live server
/// When the agent fetches and reports directly
/// Then an empty queue is None and a stale report is UnknownOperation
#[tokio::test]
async fn test_agent_client_calls() {
    let server = TestServer::start(test_store()).await;
    let agent = Agent::new(&server.url(), 1);

    assert!(agent.fetch_task().await.unwrap().is_none());

    server.store.submit("5-3").await.unwrap();
    let task = agent.fetch_task().await.unwrap().unwrap();
    let report = Agent::execute(&task).await;
    agent.send_result(&report).await.unwrap();

    let stale = TaskReport::value(task.id, 2.0);
    assert!(matches!(
        agent.send_result(&stale).await,
        Err(Error::UnknownOperation(_))
    ));

    server.stop().await;
}

/// Test: A route 404 is not an empty queue
/// Given an agent whose base URL has a wrong path prefix
/// When it pulls a task
/// Then the pull fails instead of reporting nothing to do
#[tokio::test]
async fn test_agent_wrong_base_path_is_an_error() {
    let server = TestServer::start(test_store()).await;
    server.store.submit("1+1").await.unwrap();

    let agent = Agent::new(&format!("{}/orchestrator", server.url()), 1);
    assert!(matches!(
        agent.fetch_task().await,
        Err(Error::UnexpectedResponse(_))
    ));
    assert_eq!(server.store.stats().await.leased_operations, 0);

    server.stop().await;
}
