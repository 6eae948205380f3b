//! End-to-end client flow against a scripted transport
//!
//! Create a note on a stream, read it back from the wire-echoed payload,
//! verify what was signed, then delete it and observe the cache reflect the
//! deletion.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;

use causeway::crypto;
use causeway::schemas::urls;
use causeway::transport::memory::MemoryTransport;
use causeway::transport::Method;
use causeway::{Client, ClientConfig};

const HOST: &str = "alpha.example";

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn stub_claim(transport: &MemoryTransport) {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":4102444800}"#);
    transport.stub_json(
        Method::Get,
        &format!("https://{}/api/v1/auth/claim", HOST),
        200,
        json!({"jwt": format!("{}.{}.sig", header, payload)}),
    );
}

#[tokio::test]
async fn test_create_read_delete_message_flow() {
    init_logging();

    let transport = Arc::new(MemoryTransport::new());
    stub_claim(&transport);

    let (signing_key, verifying_key) = crypto::generate_keypair();
    let config = ClientConfig::new(HOST, crypto::signing_key_hex(&signing_key));
    let client = Client::with_transport(config, Arc::clone(&transport) as Arc<dyn causeway::transport::Transport>).unwrap();

    // --- create ---------------------------------------------------------

    transport.stub_json(
        Method::Post,
        &format!("https://{}/api/v1/messages", HOST),
        200,
        json!({"status": "ok", "content": {"id": "m1"}}),
    );

    let created = client
        .api()
        .create_message(&urls::simple_note(), json!({"text": "hi"}), &["s1".to_string()])
        .await
        .unwrap();
    assert_eq!(created.content.id, "m1");

    // the envelope embedded the signed object as a string; the signature
    // covers exactly those bytes
    let posted = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::Post)
        .unwrap();
    let envelope: serde_json::Value = serde_json::from_str(posted.body.as_deref().unwrap()).unwrap();
    let rawpayload = envelope["signedObject"].as_str().unwrap().to_string();
    let signature = envelope["signature"].as_str().unwrap().to_string();
    assert_eq!(envelope["streams"], json!(["s1"]));

    crypto::verify_payload_hex(&verifying_key, rawpayload.as_bytes(), &signature).unwrap();

    // --- read back ------------------------------------------------------

    // the host serves the message back with the exact signed byte string
    let message_url = format!("https://{}/api/v1/messages/m1", HOST);
    transport.stub_json(
        Method::Get,
        &message_url,
        200,
        json!({
            "id": "m1",
            "author": client.ccid(),
            "schema": urls::simple_note(),
            "payload": rawpayload,
            "signature": signature,
            "streams": ["s1"],
            "associations": [],
            "cdate": "2024-05-01T12:00:01Z"
        }),
    );

    let message = client
        .get_message("m1", client.ccid())
        .await
        .unwrap()
        .expect("message should exist");

    assert_eq!(message.author, client.ccid());
    assert_eq!(message.schema, urls::simple_note());
    assert_eq!(message.payload.body["text"], json!("hi"));
    assert_eq!(message.payload.signer, client.ccid());
    assert_eq!(message.rawpayload, rawpayload);

    // raw and parsed stay consistent
    let reparsed: serde_json::Value = serde_json::from_str(&message.rawpayload).unwrap();
    assert_eq!(reparsed, serde_json::to_value(&message.payload).unwrap());

    // a second read is served from cache
    client.get_message("m1", client.ccid()).await.unwrap();
    assert_eq!(transport.count_for(Method::Get, &message_url), 1);

    // --- delete ---------------------------------------------------------

    transport.stub_json(
        Method::Delete,
        &format!("https://{}/api/v1/messages", HOST),
        200,
        json!({"status": "ok"}),
    );
    client.delete_message("m1").await.unwrap();

    // the host no longer returns a payload; the cached copy was invalidated,
    // so the next read refetches and reflects "not found"
    transport.stub_json(Method::Get, &message_url, 200, json!({"id": "m1"}));

    let gone = client.get_message("m1", client.ccid()).await.unwrap();
    assert!(gone.is_none());
    assert_eq!(transport.count_for(Method::Get, &message_url), 2);
}

#[tokio::test]
async fn test_fan_out_merge_across_hosts() {
    let transport = Arc::new(MemoryTransport::new());

    let (signing_key, _) = crypto::generate_keypair();
    let config = ClientConfig::new(HOST, crypto::signing_key_hex(&signing_key));
    let client = Client::with_transport(config, Arc::clone(&transport) as Arc<dyn causeway::transport::Transport>).unwrap();

    transport.stub_json(
        Method::Get,
        "https://h1/api/v1/stream/recent?streams=s1,s3",
        200,
        json!([
            {"id": "a", "timestamp": "10-5", "owner": "ccA"},
            {"id": "b", "timestamp": "10-3", "owner": "ccB"}
        ]),
    );
    transport.stub_json(
        Method::Get,
        "https://h2/api/v1/stream/recent?streams=s2",
        200,
        json!([
            {"id": "a", "timestamp": "10-5", "owner": "ccA"},
            {"id": "c", "timestamp": "9-9", "owner": "ccC"}
        ]),
    );

    let elements = client
        .api()
        .read_stream_recent(&[
            "s1@h1".to_string(),
            "s2@h2".to_string(),
            "s3@h1".to_string(),
        ])
        .await
        .unwrap();

    let ids: Vec<&str> = elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}
