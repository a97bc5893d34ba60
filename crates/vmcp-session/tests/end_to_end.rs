//! End-to-end scenarios exercising `SessionManager`, `SessionFactory`, and
//! `Session` together against the mock backend and in-memory storage, one
//! test per scenario named in `spec.md` §8.

use std::sync::Arc;
use std::time::Duration;

use vmcp_backend::mock::{MockBackendClient, MockBackendClientFactory};
use vmcp_backend::{PrefixAggregator, RawTool};
use vmcp_session::{SessionFactory, SessionFactoryConfig, SessionIdManager, SessionManager, SessionManagerConfig};
use vmcp_storage::InMemoryStorage;
use vmcp_types::{Arguments, BackendDescriptor, Identity};

fn manager(
    client_factory: MockBackendClientFactory,
    config: SessionManagerConfig,
) -> SessionManager<MockBackendClientFactory, PrefixAggregator, InMemoryStorage> {
    SessionManager::new(
        Arc::new(InMemoryStorage::new()),
        SessionFactory::new(
            Arc::new(client_factory),
            Arc::new(PrefixAggregator::new()),
            SessionFactoryConfig::default(),
        ),
        config,
    )
}

fn tool(name: &str) -> RawTool {
    RawTool {
        name: name.to_string(),
        description: None,
        input_schema: None,
    }
}

#[tokio::test]
async fn happy_path_two_backends_dispatch_to_the_right_client() {
    let client_factory = MockBackendClientFactory::new()
        .with_tools("a", vec![tool("ga")])
        .with_tools("b", vec![tool("gb")]);
    let m = manager(client_factory, SessionManagerConfig::default());

    let id = m.generate().await.unwrap();
    let session = m
        .populate(
            &id,
            Identity::new("user-1"),
            vec![BackendDescriptor::new("a", "t-a"), BackendDescriptor::new("b", "t-b")],
            None,
        )
        .await
        .unwrap();

    let mut names: Vec<_> = session.tools().into_iter().map(|t| t.exposed_name).collect();
    names.sort();
    assert_eq!(names, vec!["ga".to_string(), "gb".to_string()]);

    let result = session.call_tool("ga", Arguments::new()).await.unwrap();
    assert_eq!(result.content["tool"], "ga");

    // dispatch also reachable through the manager's fast-path lookup, as a
    // cold-start-free request would use it.
    let looked_up = m.lookup(&id).unwrap();
    looked_up.call_tool("gb", Arguments::new()).await.unwrap();
}

#[tokio::test]
async fn partial_init_failure_limits_exposed_tools_to_the_surviving_backend() {
    let client_factory = MockBackendClientFactory::new()
        .with_tools("a", vec![tool("ga")])
        .with_failure("b");
    let m = manager(client_factory, SessionManagerConfig::default());

    let id = m.generate().await.unwrap();
    let session = m
        .populate(
            &id,
            Identity::new("user-1"),
            vec![BackendDescriptor::new("a", "t-a"), BackendDescriptor::new("b", "t-b")],
            None,
        )
        .await
        .unwrap();

    let names: Vec<_> = session.tools().into_iter().map(|t| t.exposed_name).collect();
    assert_eq!(names, vec!["ga".to_string()]);

    let err = session.call_tool("gb", Arguments::new()).await.unwrap_err();
    assert!(matches!(err, vmcp_types::SessionError::UnknownTool { .. }));
}

#[tokio::test]
async fn colliding_tool_names_are_prefixed_and_routed_to_the_right_backend() {
    let client_factory = MockBackendClientFactory::new()
        .with_tools("a", vec![tool("create")])
        .with_tools("b", vec![tool("create")]);
    let m = manager(client_factory, SessionManagerConfig::default());

    let id = m.generate().await.unwrap();
    let session = m
        .populate(
            &id,
            Identity::new("user-1"),
            vec![BackendDescriptor::new("a", "t-a"), BackendDescriptor::new("b", "t-b")],
            None,
        )
        .await
        .unwrap();

    let mut names: Vec<_> = session.tools().into_iter().map(|t| t.exposed_name).collect();
    names.sort();
    assert_eq!(names, vec!["a/create".to_string(), "b/create".to_string()]);

    // unprefixed name never resolves once a collision occurred.
    let err = session.call_tool("create", Arguments::new()).await.unwrap_err();
    assert!(matches!(err, vmcp_types::SessionError::UnknownTool { .. }));

    session.call_tool("b/create", Arguments::new()).await.unwrap();
}

#[tokio::test]
async fn concurrent_dispatch_survives_a_racing_close() {
    let mock = Arc::new(MockBackendClient::new().with_tool(tool("slow")));
    let client_factory = MockBackendClientFactory::new().with_client("a", mock.clone());
    let m = manager(client_factory, SessionManagerConfig::default());

    let id = m.generate().await.unwrap();
    let session = m
        .populate(&id, Identity::new("user-1"), vec![BackendDescriptor::new("a", "t-a")], None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session.call_tool("slow", Arguments::new()).await
        }));
    }

    // Race an explicit close against the in-flight dispatches.
    let session_for_close = session.clone();
    handles.push(tokio::spawn(async move {
        session_for_close.close().await.ok();
        Ok(vmcp_types::ToolResult {
            content: serde_json::Value::Null,
            is_error: false,
        })
    }));

    for handle in handles {
        let outcome = handle.await.expect("task panicked");
        if let Err(err) = outcome {
            assert!(matches!(
                err,
                vmcp_types::SessionError::SessionClosed { .. } | vmcp_types::SessionError::BackendFailed { .. }
            ));
        }
    }

    assert!(session.is_closed().await);
    // Closing again from the manager's perspective must still be safe.
    m.terminate(&id).await.unwrap();
}

#[tokio::test]
async fn expiration_sweep_closes_every_live_backend_client_the_session_owned() {
    let mock_a = Arc::new(MockBackendClient::new());
    let mock_b = Arc::new(MockBackendClient::new());
    let client_factory = MockBackendClientFactory::new()
        .with_client("a", mock_a.clone())
        .with_client("b", mock_b.clone());

    let mut config = SessionManagerConfig::default();
    config.session_ttl_seconds = 0;
    let m = manager(client_factory, config);

    let id = m.generate().await.unwrap();
    m.populate(
        &id,
        Identity::new("user-1"),
        vec![BackendDescriptor::new("a", "t-a"), BackendDescriptor::new("b", "t-b")],
        None,
    )
    .await
    .unwrap();

    assert!(!mock_a.was_closed());
    assert!(!mock_b.was_closed());

    tokio::time::sleep(Duration::from_millis(5)).await;
    m.sweep_expired().await;

    assert!(mock_a.was_closed());
    assert!(mock_b.was_closed());
    assert!(m.lookup(&id).is_none());
    assert!(m.validate(&id).await.is_err());
}

#[tokio::test]
async fn session_isolation_closing_one_session_does_not_affect_another() {
    let mock_s1 = Arc::new(MockBackendClient::new().with_tool(tool("ga")));
    let mock_s2 = Arc::new(MockBackendClient::new().with_tool(tool("ga")));

    // Two independent sessions, each with its own client instance for the
    // same backend id — the manager never lets two sessions share a client.
    let client_factory_1 = MockBackendClientFactory::new().with_client("a", mock_s1.clone());
    let m1 = manager(client_factory_1, SessionManagerConfig::default());
    let id1 = m1.generate().await.unwrap();
    let s1 = m1
        .populate(&id1, Identity::new("user-1"), vec![BackendDescriptor::new("a", "t-a")], None)
        .await
        .unwrap();

    let client_factory_2 = MockBackendClientFactory::new().with_client("a", mock_s2.clone());
    let m2 = manager(client_factory_2, SessionManagerConfig::default());
    let id2 = m2.generate().await.unwrap();
    let s2 = m2
        .populate(&id2, Identity::new("user-2"), vec![BackendDescriptor::new("a", "t-a")], None)
        .await
        .unwrap();

    s1.close().await.unwrap();

    assert!(mock_s1.was_closed());
    assert!(!mock_s2.was_closed());
    s2.call_tool("ga", Arguments::new()).await.unwrap();
}
