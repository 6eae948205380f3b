//! Message loader and write operations

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::cache::keys;
use crate::model::wire::WireMessage;
use crate::model::{CreatedObject, Message, ObjectKind, ResponseEnvelope};
use crate::transport::{HttpRequest, Method, Transport};
use crate::types::Result;

use super::Api;

#[derive(Serialize)]
struct MessagePostRequest<'a> {
    #[serde(rename = "signedObject")]
    signed_object: &'a str,
    signature: &'a str,
    streams: &'a [String],
}

impl Api {
    /// Create a signed message on the given streams (own host).
    pub async fn create_message<T: Serialize>(
        &self,
        schema: &str,
        body: T,
        streams: &[String],
    ) -> Result<ResponseEnvelope<CreatedObject>> {
        let object = self.new_signed_object(ObjectKind::Message, schema, body);
        let (canonical, signature) = self.sign_object(&object)?;

        let request = HttpRequest::new(Method::Post, self.own_url("/messages")).with_json(
            &MessagePostRequest {
                signed_object: &canonical,
                signature: &signature,
                streams,
            },
        )?;

        let response = self.session.authorized_fetch(request).await?.ensure_success()?;
        let envelope: ResponseEnvelope<CreatedObject> = response.json()?;

        debug!(id = %envelope.content.id, schema = %schema, "message created");
        Ok(envelope)
    }

    /// Load a message by id from `host` (own host when `None`).
    ///
    /// A well-formed response without a payload resolves to `None`.
    pub async fn read_message(&self, id: &str, host: Option<&str>) -> Result<Option<Message>> {
        let cache_key = keys::message(id);
        let host = host.filter(|h| !h.is_empty()).unwrap_or(&self.config.host);
        let url = self.url(host, &format!("/messages/{}", id));
        let transport = Arc::clone(&self.transport);

        self.messages
            .get_or_load(&cache_key, || fetch_message(transport, url))
            .await
    }

    /// Load a message from its author's authoritative host.
    pub async fn read_message_with_author(&self, id: &str, author: &str) -> Result<Option<Message>> {
        let host = self.resolve_host(author).await?;
        self.read_message(id, Some(&host)).await
    }

    /// Delete a message on `host` (own host when `None`) and drop any cached
    /// copy so a following read reflects the deletion.
    pub async fn delete_message(&self, id: &str, host: Option<&str>) -> Result<Value> {
        let host = host.filter(|h| !h.is_empty()).unwrap_or(&self.config.host);

        let request = HttpRequest::new(Method::Delete, self.url(host, "/messages"))
            .with_json(&json!({ "id": id }))?;

        let response = self.session.authorized_fetch(request).await?.ensure_success()?;

        self.invalidate_message(id);
        debug!(id = %id, "message deleted");

        response.json()
    }

    /// Drop the cached copy of a message
    pub fn invalidate_message(&self, id: &str) {
        self.messages.invalidate(&keys::message(id));
    }
}

async fn fetch_message(transport: Arc<dyn Transport>, url: String) -> Result<Option<Message>> {
    let response = transport.fetch(HttpRequest::get(url)).await?.ensure_success()?;
    let wire: WireMessage = response.json()?;
    wire.into_message()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api_with, foreign_payload, stub_claim, OWN_HOST};
    use crate::schemas::urls;
    use crate::transport::memory::MemoryTransport;
    use crate::transport::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn message_url(host: &str, id: &str) -> String {
        format!("https://{}/api/v1/messages/{}", host, id)
    }

    #[tokio::test]
    async fn test_read_message_decodes_and_caches() {
        let transport = Arc::new(MemoryTransport::new());
        let raw = foreign_payload("ccBob", &urls::simple_note(), json!({"body": "hi"}));
        transport.stub_json(
            Method::Get,
            &message_url(OWN_HOST, "m1"),
            200,
            json!({
                "id": "m1",
                "author": "ccBob",
                "schema": urls::simple_note(),
                "payload": raw,
                "signature": "cafe",
                "streams": ["s1"],
                "associations": [],
                "cdate": "2024-05-01T12:00:01Z"
            }),
        );

        let api = api_with(Arc::clone(&transport));

        let message = api.read_message("m1", None).await.unwrap().unwrap();
        assert_eq!(message.author, "ccBob");
        assert_eq!(message.rawpayload, raw);
        assert_eq!(message.payload.body["body"], json!("hi"));

        api.read_message("m1", None).await.unwrap();
        assert_eq!(transport.count_for(Method::Get, &message_url(OWN_HOST, "m1")), 1);
    }

    #[tokio::test]
    async fn test_read_message_without_payload_is_absent() {
        let transport = Arc::new(MemoryTransport::new());
        transport.stub_json(Method::Get, &message_url(OWN_HOST, "m1"), 200, json!({"id": "m1"}));

        let api = api_with(transport);
        assert!(api.read_message("m1", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_message_with_author_uses_authoritative_host() {
        let transport = Arc::new(MemoryTransport::new());
        transport.stub_json(
            Method::Get,
            &format!("https://{}/api/v1/entity/ccBob", OWN_HOST),
            200,
            json!({"ccid": "ccBob", "domain": "beta.example"}),
        );
        let raw = foreign_payload("ccBob", &urls::simple_note(), json!({"body": "hi"}));
        transport.stub_json(
            Method::Get,
            &message_url("beta.example", "m1"),
            200,
            json!({"id": "m1", "author": "ccBob", "payload": raw}),
        );

        let api = api_with(Arc::clone(&transport));

        let message = api.read_message_with_author("m1", "ccBob").await.unwrap().unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(
            transport.count_for(Method::Get, &message_url("beta.example", "m1")),
            1
        );
    }

    #[tokio::test]
    async fn test_create_message_sends_signed_envelope() {
        let transport = Arc::new(MemoryTransport::new());
        stub_claim(&transport);
        transport.stub_json(
            Method::Post,
            &format!("https://{}/api/v1/messages", OWN_HOST),
            200,
            json!({"status": "ok", "content": {"id": "m9"}}),
        );

        let api = api_with(Arc::clone(&transport));

        let envelope = api
            .create_message(&urls::simple_note(), json!({"body": "hello"}), &["s1".to_string()])
            .await
            .unwrap();
        assert_eq!(envelope.content.id, "m9");

        let posted = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::Post)
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(posted.body.as_deref().unwrap()).unwrap();

        // the envelope embeds the signed object as a string, and the
        // signature verifies over exactly those bytes
        let canonical = body["signedObject"].as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(canonical).unwrap();
        assert_eq!(parsed["signer"], api.ccid());
        assert_eq!(parsed["type"], "Message");
        assert_eq!(body["streams"], json!(["s1"]));

        let verifying_key = api.signing_key.verifying_key();
        crate::crypto::verify_payload_hex(
            &verifying_key,
            canonical.as_bytes(),
            body["signature"].as_str().unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_delete_message_invalidates_cache() {
        let transport = Arc::new(MemoryTransport::new());
        stub_claim(&transport);
        let raw = foreign_payload("ccBob", &urls::simple_note(), json!({"body": "hi"}));
        transport.stub_json(
            Method::Get,
            &message_url(OWN_HOST, "m1"),
            200,
            json!({"id": "m1", "author": "ccBob", "payload": raw}),
        );
        transport.stub_json(
            Method::Delete,
            &format!("https://{}/api/v1/messages", OWN_HOST),
            200,
            json!({"status": "ok"}),
        );

        let api = api_with(Arc::clone(&transport));

        api.read_message("m1", None).await.unwrap();
        api.delete_message("m1", None).await.unwrap();

        // fresh fetch after the delete
        transport.stub_json(Method::Get, &message_url(OWN_HOST, "m1"), 200, json!({"id": "m1"}));
        assert!(api.read_message("m1", None).await.unwrap().is_none());
        assert_eq!(transport.count_for(Method::Get, &message_url(OWN_HOST, "m1")), 2);
    }
}
