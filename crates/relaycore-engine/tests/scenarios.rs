//! End-to-end scenarios, matching the literal inputs/outputs specified for
//! a freshly Connected session whose `RequestManager` is empty.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use relaycore_engine::{
    Capability, CapabilityRegistry, EngineConfig, HandlerFn, HandlerFuture, InputProcessor,
    RequestManager, Session, SessionStatus,
};
use relaycore_protocol::RequestId;
use serde_json::{json, Value};

struct Echo;
impl Capability for Echo {
    fn handlers(&self) -> HashMap<String, HandlerFn> {
        let mut map = HashMap::new();
        map.insert(
            "echo".to_string(),
            Arc::new(|params: Option<Value>, _session: Session| -> HandlerFuture {
                Box::pin(async move { Ok(params.unwrap_or(Value::Null)) })
            }) as HandlerFn,
        );
        map
    }
}

fn connected_session(registry: Arc<CapabilityRegistry>) -> (Session, Arc<InputProcessor>) {
    let input = Arc::new(InputProcessor::new(registry, EngineConfig::default()));
    let session = Session::new(None, Arc::clone(&input), RequestManager::new(), EngineConfig::default());
    session.set_status(SessionStatus::Connected);
    (session, input)
}

#[tokio::test]
async fn s1_echo_request() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.add_server_capability(Arc::new(Echo));
    let (session, input) = connected_session(registry);
    let mut guard = session.acquire_output().unwrap();
    tokio::spawn({
        let input = Arc::clone(&input);
        async move { input.process().await }
    });

    let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"m":"hi"}}"#;
    input.put_bytes(&session, bytes).unwrap();

    let response = guard.recv().await.unwrap();
    let wire = response.to_wire().unwrap();
    let text = serde_json::to_string(&wire).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({"jsonrpc": "2.0", "id": 1, "result": {"m": "hi"}}));
}

#[tokio::test]
async fn s2_unknown_method() {
    let registry = Arc::new(CapabilityRegistry::new());
    let (session, input) = connected_session(registry);
    let mut guard = session.acquire_output().unwrap();
    tokio::spawn({
        let input = Arc::clone(&input);
        async move { input.process().await }
    });

    let bytes = br#"{"jsonrpc":"2.0","id":2,"method":"does/not/exist"}"#;
    input.put_bytes(&session, bytes).unwrap();

    let response = guard.recv().await.unwrap();
    let wire = response.to_wire().unwrap();
    let value: Value = serde_json::to_value(&wire).unwrap();
    assert_eq!(value["error"]["code"], json!(-32601));
    assert_eq!(value["error"]["message"], json!("Method not found: does/not/exist"));
}

#[tokio::test]
async fn s3_notification_is_silent() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.add_server_capability(Arc::new(Echo));
    let (session, input) = connected_session(registry);
    let mut guard = session.acquire_output().unwrap();
    tokio::spawn({
        let input = Arc::clone(&input);
        async move { input.process().await }
    });

    let bytes = br#"{"jsonrpc":"2.0","id":9,"method":"notifications/ping"}"#;
    input.put_bytes(&session, bytes).unwrap();

    // Prove silence by racing a distinguishable follow-up through the same
    // pipeline: if the notification had produced a frame, it would arrive
    // first.
    let followup = br#"{"jsonrpc":"2.0","id":99,"method":"echo","params":{"m":"after"}}"#;
    input.put_bytes(&session, followup).unwrap();

    let response = guard.recv().await.unwrap();
    assert_eq!(response.id, Some(RequestId::Number(99)));
}

#[tokio::test]
async fn s4_batch() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.add_server_capability(Arc::new(Echo));
    let (session, input) = connected_session(registry);
    let mut guard = session.acquire_output().unwrap();
    tokio::spawn({
        let input = Arc::clone(&input);
        async move { input.process().await }
    });

    let bytes = br#"[{"jsonrpc":"2.0","id":1,"method":"echo","params":{"m":"a"}},
         {"jsonrpc":"2.0","method":"notifications/x"},
         {"jsonrpc":"2.0","id":2,"method":"echo","params":{"m":"b"}}]"#;
    input.put_bytes(&session, bytes).unwrap();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = guard.recv().await.unwrap();
        ids.push(response.id.clone());
    }
    ids.sort_by_key(|id| format!("{id:?}"));
    assert_eq!(ids, vec![Some(RequestId::Number(1)), Some(RequestId::Number(2))]);
}

#[tokio::test]
async fn s5_server_initiated_request_correlation() {
    let registry = Arc::new(CapabilityRegistry::new());
    let (session, input) = connected_session(registry);
    tokio::spawn({
        let input = Arc::clone(&input);
        async move { input.process().await }
    });

    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_clone = Arc::clone(&invoked);
    let id = session
        .send_request(
            "peer/ping",
            None,
            Box::new(move |msg| {
                assert_eq!(msg.result, Some(json!({"ok": true})));
                invoked_clone.store(true, Ordering::SeqCst);
            }),
        )
        .unwrap();
    assert_eq!(id, RequestId::Number(1));
    assert_eq!(session.request_manager().outstanding(), 1);

    let bytes = br#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#;
    input.put_bytes(&session, bytes).unwrap();

    for _ in 0..50 {
        if invoked.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(invoked.load(Ordering::SeqCst));
    assert_eq!(session.request_manager().outstanding(), 0);
}

/// `list/tools` here is a server-initiated request to a simulated peer, not
/// a locally dispatched method, so it has no local handler. A loopback task
/// drains the session's output queue the way a transport would, and injects
/// the peer's (synthetic, paginated) reply back through `input.put_bytes` —
/// the same mechanism `s5` uses to inject its single response.
#[tokio::test]
async fn s6_paginated_sync_request() {
    let registry = Arc::new(CapabilityRegistry::new());
    let (session, input) = connected_session(registry);
    tokio::spawn({
        let input = Arc::clone(&input);
        async move { input.process().await }
    });

    let mut guard = session.acquire_output().unwrap();
    let loopback_session = session.clone();
    let loopback_input = Arc::clone(&input);
    tokio::spawn(async move {
        while let Some(msg) = guard.recv().await {
            let Some(id) = msg.id.clone() else { continue };
            let has_cursor = msg.params.as_ref().and_then(|p| p.get("cursor")).is_some();
            let result = if has_cursor {
                json!({"items": ["b"]})
            } else {
                json!({"nextCursor": "c1", "items": ["a"]})
            };
            let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
            let bytes = serde_json::to_vec(&response).unwrap();
            loopback_input.put_bytes(&loopback_session, &bytes).unwrap();
        }
    });

    let mut pages = Vec::new();
    let mut stream = Box::pin(session.send_request_sync("list/tools", None));
    while let Some(page) = stream.next().await {
        pages.push(page);
    }

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].result, Some(json!({"nextCursor": "c1", "items": ["a"]})));
    assert_eq!(pages[1].result, Some(json!({"items": ["b"]})));
}
