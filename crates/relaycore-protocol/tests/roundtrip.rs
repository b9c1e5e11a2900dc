//! Property tests for the wire-level round-trip and framing invariants
//! (P1, P2): these don't need a session or a dispatcher, only the
//! `jsonrpc` encode/decode pair.

use proptest::prelude::*;
use relaycore_protocol::jsonrpc::{decode, encode};
use relaycore_protocol::{JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use serde_json::{json, Value};

fn arb_request_id() -> impl Strategy<Value = RequestId> {
    prop_oneof![
        any::<i64>().prop_map(RequestId::Number),
        "[a-zA-Z0-9_-]{1,16}".prop_map(RequestId::String),
    ]
}

fn arb_params() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        "[a-z]{1,8}".prop_map(|s| Some(json!({ "m": s }))),
    ]
}

proptest! {
    /// P1: parsing a freshly encoded request preserves id, method, and
    /// params.
    #[test]
    fn request_round_trips(id in arb_request_id(), method in "[a-z/]{1,16}", params in arb_params()) {
        let request = JsonRpcRequest::new(method.clone(), params.clone(), id.clone());
        let wire = JsonRpcMessage::Request(request);
        let text = encode(&wire).unwrap();

        let decoded = decode(text.as_bytes()).unwrap();
        prop_assert_eq!(decoded.len(), 1);
        match &decoded[0] {
            JsonRpcMessage::Request(req) => {
                prop_assert_eq!(&req.id, &id);
                prop_assert_eq!(&req.method, &method);
                prop_assert_eq!(&req.params, &params);
            }
            other => prop_assert!(false, "expected a request, got {other:?}"),
        }
    }

    /// P1: parsing a freshly encoded notification preserves method/params
    /// and carries no id.
    #[test]
    fn notification_round_trips(method in "[a-z/]{1,16}", params in arb_params()) {
        let notification = JsonRpcNotification::new(method.clone(), params.clone());
        let wire = JsonRpcMessage::Notification(notification);
        let text = encode(&wire).unwrap();

        let decoded = decode(text.as_bytes()).unwrap();
        prop_assert_eq!(decoded.len(), 1);
        match &decoded[0] {
            JsonRpcMessage::Notification(n) => {
                prop_assert_eq!(&n.method, &method);
                prop_assert_eq!(&n.params, &params);
            }
            other => prop_assert!(false, "expected a notification, got {other:?}"),
        }
    }

    /// P2: every serialized response carries exactly one of `result` /
    /// `error`, regardless of which variant was constructed.
    #[test]
    fn response_always_has_exactly_one_body(id in arb_request_id(), is_error in any::<bool>()) {
        let wire = if is_error {
            JsonRpcMessage::Response(JsonRpcResponse::error(
                id,
                JsonRpcError { code: -32000, message: "boom".into(), data: None },
            ))
        } else {
            JsonRpcMessage::Response(JsonRpcResponse::success(id, json!({"ok": true})))
        };
        let text = encode(&wire).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        prop_assert_eq!(value.get("result").is_some(), !is_error);
        prop_assert_eq!(value.get("error").is_some(), is_error);
        prop_assert_eq!(value["jsonrpc"], json!("2.0"));
    }
}

#[test]
fn batch_of_mixed_shapes_round_trips_in_order() {
    let bytes = br#"[
        {"jsonrpc":"2.0","id":1,"method":"echo","params":{"m":"a"}},
        {"jsonrpc":"2.0","method":"notifications/x"},
        {"jsonrpc":"2.0","id":2,"result":{"ok":true}}
    ]"#;
    let decoded = decode(bytes).unwrap();
    assert_eq!(decoded.len(), 3);
    assert!(matches!(decoded[0], JsonRpcMessage::Request(_)));
    assert!(matches!(decoded[1], JsonRpcMessage::Notification(_)));
    assert!(matches!(decoded[2], JsonRpcMessage::Response(_)));
}
