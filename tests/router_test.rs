mod common;

use bytes::Bytes;
use common::{cmd, directory, MockTransport};
use std::sync::Arc;
use tenant_proxy::cluster::UpstreamError;
use tenant_proxy::protocol::RespValue;
use tenant_proxy::router::{ALREADY_AUTHENTICATED_ERROR, NOAUTH_ERROR, WRONGPASS_ERROR};
use tenant_proxy::Router;

fn router(mock: &MockTransport, auth_required: bool) -> Router {
    Router::new(directory(), Arc::new(mock.clone()), auth_required)
}

#[tokio::test]
async fn test_command_before_auth_is_rejected() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    let reply = router.handle(conn, cmd(&["GET", "foo"])).await;

    assert_eq!(reply, RespValue::error(NOAUTH_ERROR));
    assert!(mock.cluster_calls().is_empty());
}

#[tokio::test]
async fn test_auth_then_commands_are_prefixed() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    let reply = router.handle(conn, cmd(&["AUTH", "t1", "s"])).await;
    assert_eq!(reply, RespValue::ok());
    assert_eq!(router.sessions().lookup(conn).as_deref(), Some("t1"));

    router.handle(conn, cmd(&["SET", "foo", "bar", "EX", "60"])).await;
    router.handle(conn, cmd(&["hset", "h", "field", "value"])).await;
    router
        .handle(conn, cmd(&["MGET", "k1", "k2", "k3"]))
        .await;

    assert_eq!(
        mock.cluster_calls(),
        vec![
            cmd(&["SET", "t1:foo", "bar", "EX", "60"]),
            cmd(&["hset", "t1:h", "field", "value"]),
            cmd(&["MGET", "t1:k1", "t1:k2", "t1:k3"]),
        ]
    );
}

#[tokio::test]
async fn test_failed_auth_leaves_session_unauthenticated() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    let wrong_password = router.handle(conn, cmd(&["AUTH", "t1", "wrong"])).await;
    let unknown_user = router.handle(conn, cmd(&["AUTH", "ghost", "s"])).await;

    // both causes look identical to the client
    assert_eq!(wrong_password, RespValue::error(WRONGPASS_ERROR));
    assert_eq!(unknown_user, wrong_password);
    assert_eq!(router.sessions().lookup(conn), None);
    assert_eq!(
        router.handle(conn, cmd(&["GET", "foo"])).await,
        RespValue::error(NOAUTH_ERROR)
    );
}

#[tokio::test]
async fn test_auth_requires_username_and_password() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    let reply = router.handle(conn, cmd(&["AUTH", "s"])).await;

    assert!(matches!(reply, RespValue::Error(msg) if msg.contains("wrong number of arguments")));
    assert!(mock.cluster_calls().is_empty());
}

#[tokio::test]
async fn test_reauthentication_is_rejected() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;
    let reply = router.handle(conn, cmd(&["AUTH", "t1", "s"])).await;

    assert_eq!(reply, RespValue::error(ALREADY_AUTHENTICATED_ERROR));
    router.handle(conn, cmd(&["GET", "k"])).await;
    assert_eq!(mock.cluster_calls(), vec![cmd(&["GET", "t2:k"])]);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let a = router.connect();
    let b = router.connect();

    router.handle(a, cmd(&["AUTH", "t1", "s"])).await;
    router.handle(b, cmd(&["AUTH", "t2", "pw"])).await;
    router.handle(a, cmd(&["SET", "shared", "1"])).await;
    router.handle(b, cmd(&["SET", "shared", "2"])).await;

    assert_eq!(
        mock.cluster_calls(),
        vec![cmd(&["SET", "t1:shared", "1"]), cmd(&["SET", "t2:shared", "2"])]
    );
}

#[tokio::test]
async fn test_ping_is_answered_locally() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    assert_eq!(
        router.handle(conn, cmd(&["PING"])).await,
        RespValue::error(NOAUTH_ERROR)
    );

    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;
    assert_eq!(
        router.handle(conn, cmd(&["PING"])).await,
        RespValue::simple_string("PONG")
    );
    assert_eq!(
        router.handle(conn, cmd(&["ping", "hello"])).await,
        RespValue::bulk_string(Bytes::from("hello"))
    );
    assert!(mock.cluster_calls().is_empty());
}

#[tokio::test]
async fn test_disconnect_clears_session() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();
    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;

    router.disconnect(conn);

    assert_eq!(router.sessions().lookup(conn), None);
    assert!(router.sessions().is_empty());
    assert_eq!(
        router.handle(conn, cmd(&["GET", "k"])).await,
        RespValue::error(NOAUTH_ERROR)
    );
    assert!(mock.cluster_calls().is_empty());
}

#[tokio::test]
async fn test_auth_disabled_passes_through_unprefixed() {
    let mock = MockTransport::new();
    let router = router(&mock, false);
    let conn = router.connect();

    router.handle(conn, cmd(&["GET", "foo"])).await;

    assert_eq!(mock.cluster_calls(), vec![cmd(&["GET", "foo"])]);
}

#[tokio::test]
async fn test_auth_disabled_still_prefixes_authenticated_tenants() {
    let mock = MockTransport::new();
    let router = router(&mock, false);
    let conn = router.connect();

    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;
    router.handle(conn, cmd(&["GET", "foo"])).await;

    assert_eq!(mock.cluster_calls(), vec![cmd(&["GET", "t2:foo"])]);
}

#[tokio::test]
async fn test_upstream_error_is_surfaced() {
    let mock = MockTransport::new();
    mock.push_cluster(Err(UpstreamError::new(
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )));
    let router = router(&mock, true);
    let conn = router.connect();
    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;

    let reply = router.handle(conn, cmd(&["INCR", "list"])).await;

    assert_eq!(
        reply,
        RespValue::error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
    // the connection keeps working
    assert_eq!(
        router.handle(conn, cmd(&["GET", "k"])).await,
        RespValue::ok()
    );
}

#[tokio::test]
async fn test_redirect_through_router() {
    let mock = MockTransport::new();
    mock.push_cluster(Err(UpstreamError::new("MOVED 12539 127.0.0.1:9999")));
    mock.push_direct(Ok(RespValue::bulk_string(Bytes::from("v"))));
    let router = router(&mock, true);
    let conn = router.connect();
    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;

    let reply = router.handle(conn, cmd(&["GET", "k"])).await;

    assert_eq!(reply, RespValue::bulk_string(Bytes::from("v")));
    assert_eq!(
        mock.direct_calls(),
        vec![("127.0.0.1:9999".to_string(), cmd(&["GET", "t2:k"]))]
    );
}

#[tokio::test]
async fn test_keys_reply_is_stripped() {
    let mock = MockTransport::new();
    mock.push_cluster(Ok(RespValue::Array(vec![
        RespValue::bulk_string(Bytes::from("t2:a")),
        RespValue::bulk_string(Bytes::from("t2:b")),
    ])));
    let router = router(&mock, true);
    let conn = router.connect();
    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;

    let reply = router.handle(conn, cmd(&["KEYS", "*"])).await;

    assert_eq!(mock.cluster_calls(), vec![cmd(&["KEYS", "t2:*"])]);
    assert_eq!(
        reply,
        RespValue::Array(vec![
            RespValue::bulk_string(Bytes::from("a")),
            RespValue::bulk_string(Bytes::from("b")),
        ])
    );
}

#[tokio::test]
async fn test_auth_after_disconnect_does_not_bind() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();
    router.disconnect(conn);

    let reply = router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;

    assert!(reply.is_error());
    assert_ne!(reply, RespValue::error(WRONGPASS_ERROR));
    assert!(router.sessions().is_empty());
}

#[tokio::test]
async fn test_quit_needs_no_auth() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    assert_eq!(router.handle(conn, cmd(&["QUIT"])).await, RespValue::ok());
    assert!(mock.cluster_calls().is_empty());
}

#[tokio::test]
async fn test_multi_key_commands_cannot_reach_other_tenants() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();
    router.handle(conn, cmd(&["AUTH", "t1", "s"])).await;

    router.handle(conn, cmd(&["BLPOP", "q", "t2:q", "0"])).await;
    router
        .handle(conn, cmd(&["SUNIONSTORE", "{x}d", "t2:{x}secret"]))
        .await;
    router
        .handle(conn, cmd(&["ZUNIONSTORE", "d", "2", "t2:z1", "t2:z2"]))
        .await;

    assert_eq!(
        mock.cluster_calls(),
        vec![
            cmd(&["BLPOP", "t1:q", "t1:t2:q", "0"]),
            cmd(&["SUNIONSTORE", "t1:{x}d", "t1:t2:{x}secret"]),
            cmd(&["ZUNIONSTORE", "t1:d", "2", "t1:t2:z1", "t1:t2:z2"]),
        ]
    );
}

#[tokio::test]
async fn test_keyspace_wide_commands_are_forwarded_unchanged() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();
    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await;

    router.handle(conn, cmd(&["DBSIZE"])).await;
    router.handle(conn, cmd(&["SCAN", "0"])).await;

    assert_eq!(
        mock.cluster_calls(),
        vec![cmd(&["DBSIZE"]), cmd(&["SCAN", "0"])]
    );
}

#[tokio::test]
async fn test_empty_command() {
    let mock = MockTransport::new();
    let router = router(&mock, true);
    let conn = router.connect();

    let reply = router.handle(conn, cmd(&[])).await;

    assert!(reply.is_error());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections() {
    let mock = MockTransport::new();
    let router = router(&mock, true);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let conn = router.connect();
                assert_eq!(
                    router.handle(conn, cmd(&["AUTH", "t2", "pw"])).await,
                    RespValue::ok()
                );
                let key = format!("k{}", i);
                router.handle(conn, cmd(&["GET", key.as_str()])).await;
                router.disconnect(conn);
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let calls = mock.cluster_calls();
    assert_eq!(calls.len(), 16);
    assert!(calls
        .iter()
        .all(|c| c.args()[1].starts_with(b"t2:k")));
    assert!(router.sessions().is_empty());
}
