//! RPC bridge behavior over a live listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use httpserve::rpc::{code, ERROR_STATUS};
use httpserve::{
    unary, Capabilities, MethodDescription, RegisterError, Server, ServiceDescription,
    ServiceError,
};

mod common;

use common::{greeter_description, Greeter, HelloRequest};

fn greeter_server() -> (Server, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = Server::builder().address("127.0.0.1:0").build();
    server
        .register_service(greeter_description(), Greeter::new(Arc::clone(&calls)))
        .unwrap();
    (server, calls)
}

#[tokio::test]
async fn test_default_path_round_trip_emits_zero_valued_fields() {
    let (server, _calls) = greeter_server();
    let test = common::start_server(server).await;

    let resp = common::client()
        .post(test.url("/v1/test.Greeter/Hello"))
        .body(r#"{"name":"world"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["greeting"], "hello, world");
    // The zero-valued count must be present, not dropped.
    assert_eq!(body.get("count"), Some(&serde_json::json!(0)));

    test.stop().await.unwrap();
}

#[tokio::test]
async fn test_method_verb_and_path_overrides() {
    let (server, _calls) = greeter_server();
    let test = common::start_server(server).await;
    let client = common::client();

    let resp = client
        .get(test.url("/v1/wave"))
        .body(r#"{"name":"crew"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["greeting"], "wave, crew");

    // The overridden method only answers its own verb, and the
    // generated path never existed for it.
    let resp = client.post(test.url("/v1/wave")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let resp = client
        .get(test.url("/v1/test.Greeter/Wave"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    test.stop().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_body_never_reaches_the_implementation() {
    let (server, calls) = greeter_server();
    let test = common::start_server(server).await;
    let client = common::client();

    for bad_body in ["{oops", ""] {
        let resp = client
            .post(test.url("/v1/test.Greeter/Hello"))
            .body(bad_body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), ERROR_STATUS.as_u16());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], code::INVALID_MESSAGE);
        assert!(body["message"].is_string());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    test.stop().await.unwrap();
}

#[tokio::test]
async fn test_service_errors_keep_their_code_on_the_wire() {
    struct Grump;
    impl Capabilities for Grump {
        fn provides(&self, method: &str) -> bool {
            method == "Complain"
        }
    }

    let desc = ServiceDescription::new("test", "Grump").method(MethodDescription::new(
        "Complain",
        unary(|_svc: Arc<Grump>, _ctx, _input: HelloRequest| async move {
            Err::<common::HelloReply, _>(ServiceError::new(9, "tired"))
        }),
    ));
    let mut server = Server::builder().address("127.0.0.1:0").build();
    server.register_service(desc, Grump).unwrap();
    let test = common::start_server(server).await;

    let resp = common::client()
        .post(test.url("/v1/test.Grump/Complain"))
        .body(r#"{"name":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), ERROR_STATUS.as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 9);
    assert_eq!(body["message"], "tired");

    test.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_registration_installs_no_routes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = Server::builder().address("127.0.0.1:0").build();

    let desc = greeter_description().contract(["Hello", "Wave", "Shout"]);
    let err = server
        .register_service(desc, Greeter::new(calls))
        .unwrap_err();
    let RegisterError::Conformance { missing, .. } = err;
    assert_eq!(missing, vec!["Shout".to_string()]);
    assert_eq!(server.route_count(), 0);

    // Nothing answers on the would-be paths either.
    let test = common::start_server(server).await;
    let resp = common::client()
        .post(test.url("/v1/test.Greeter/Hello"))
        .body(r#"{"name":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    test.stop().await.unwrap();
}
