//! Character loader and upsert
//!
//! Characters are latest-wins records keyed by `(author, schema)`; an upsert
//! carrying an existing id replaces in place server-side. Reads go to the
//! author's authoritative host.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::keys;
use crate::model::wire::WireCharacterList;
use crate::model::{Character, CreatedObject, ObjectKind, ResponseEnvelope};
use crate::transport::{HttpRequest, Method, Transport};
use crate::types::Result;

use super::Api;

#[derive(Serialize)]
struct CharacterPutRequest<'a> {
    #[serde(rename = "signedObject")]
    signed_object: &'a str,
    signature: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

impl Api {
    /// Create or replace one of this identity's characters (own host).
    ///
    /// Passing the existing `id` replaces in place. The local cache entry for
    /// `(self, schema)` is invalidated so the next read sees the new version.
    pub async fn upsert_character<T: Serialize>(
        &self,
        schema: &str,
        body: T,
        id: Option<&str>,
    ) -> Result<ResponseEnvelope<CreatedObject>> {
        let object = self.new_signed_object(ObjectKind::Character, schema, body);
        let (canonical, signature) = self.sign_object(&object)?;

        let request = HttpRequest::new(Method::Put, self.own_url("/characters")).with_json(
            &CharacterPutRequest {
                signed_object: &canonical,
                signature: &signature,
                id,
            },
        )?;

        let response = self.session.authorized_fetch(request).await?.ensure_success()?;
        let envelope: ResponseEnvelope<CreatedObject> = response.json()?;

        self.invalidate_character(&self.ccid, schema);
        debug!(id = %envelope.content.id, schema = %schema, "character upserted");
        Ok(envelope)
    }

    /// Load the latest character of `author` for `schema` from the author's
    /// authoritative host. An empty result set resolves to `None`.
    pub async fn read_character(&self, author: &str, schema: &str) -> Result<Option<Character>> {
        let cache_key = keys::character(author, schema);
        let host = self.resolve_host(author).await?;
        let url = self.url(
            &host,
            &format!(
                "/characters?author={}&schema={}",
                author,
                urlencoding::encode(schema)
            ),
        );
        let transport = Arc::clone(&self.transport);

        self.characters
            .get_or_load(&cache_key, || fetch_character(transport, url))
            .await
    }

    /// Drop the cached character for `(author, schema)`
    pub fn invalidate_character(&self, author: &str, schema: &str) {
        self.characters.invalidate(&keys::character(author, schema));
    }
}

async fn fetch_character(transport: Arc<dyn Transport>, url: String) -> Result<Option<Character>> {
    let response = transport.fetch(HttpRequest::get(url)).await?.ensure_success()?;
    let list: WireCharacterList = response.json()?;

    match list.characters.into_iter().next() {
        Some(wire) => wire.into_character(),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api_with, stub_claim, OWN_HOST};
    use crate::schemas::urls;
    use crate::transport::memory::MemoryTransport;
    use crate::transport::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn character_url(host: &str, author: &str, schema: &str) -> String {
        format!(
            "https://{}/api/v1/characters?author={}&schema={}",
            host,
            author,
            urlencoding::encode(schema)
        )
    }

    fn profile_payload(signer: &str) -> String {
        serde_json::to_string(&json!({
            "signer": signer,
            "type": "Character",
            "schema": urls::profile(),
            "body": {"username": "bob", "description": "", "avatar": "", "banner": ""},
            "meta": {"client": "other"},
            "signedAt": "2024-05-01T12:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_character_keys_cache_by_author_and_schema() {
        let transport = Arc::new(MemoryTransport::new());
        transport.stub_json(
            Method::Get,
            &format!("https://{}/api/v1/entity/ccBob", OWN_HOST),
            200,
            json!({"ccid": "ccBob", "domain": ""}),
        );
        let url = character_url(OWN_HOST, "ccBob", &urls::profile());
        transport.stub_json(
            Method::Get,
            &url,
            200,
            json!({"characters": [{
                "id": "ch1",
                "author": "ccBob",
                "schema": urls::profile(),
                "payload": profile_payload("ccBob")
            }]}),
        );
        // same author, different schema: its own slot, empty result
        transport.stub_json(
            Method::Get,
            &character_url(OWN_HOST, "ccBob", &urls::userstreams()),
            200,
            json!({"characters": []}),
        );

        let api = api_with(Arc::clone(&transport));

        let profile = api.read_character("ccBob", &urls::profile()).await.unwrap().unwrap();
        assert_eq!(profile.id, "ch1");
        assert_eq!(profile.payload.body["username"], json!("bob"));

        assert!(api
            .read_character("ccBob", &urls::userstreams())
            .await
            .unwrap()
            .is_none());

        // repeated profile read is served from cache
        api.read_character("ccBob", &urls::profile()).await.unwrap();
        assert_eq!(transport.count_for(Method::Get, &url), 1);
    }

    #[tokio::test]
    async fn test_upsert_character_invalidates_own_cache_entry() {
        let transport = Arc::new(MemoryTransport::new());
        stub_claim(&transport);
        transport.stub_json(
            Method::Put,
            &format!("https://{}/api/v1/characters", OWN_HOST),
            200,
            json!({"status": "ok", "content": {"id": "ch1"}}),
        );

        let api = api_with(Arc::clone(&transport));
        let own_ccid = api.ccid().to_string();

        transport.stub_json(
            Method::Get,
            &format!("https://{}/api/v1/entity/{}", OWN_HOST, own_ccid),
            200,
            json!({"ccid": own_ccid, "domain": ""}),
        );
        let url = character_url(OWN_HOST, &own_ccid, &urls::profile());
        transport.stub_json(Method::Get, &url, 200, json!({"characters": []}));

        // prime the cache, upsert, then observe a refetch
        api.read_character(&own_ccid, &urls::profile()).await.unwrap();
        api.upsert_character(
            &urls::profile(),
            json!({"username": "me", "description": "", "avatar": "", "banner": ""}),
            None,
        )
        .await
        .unwrap();
        api.read_character(&own_ccid, &urls::profile()).await.unwrap();

        assert_eq!(transport.count_for(Method::Get, &url), 2);
    }

    #[tokio::test]
    async fn test_upsert_carries_id_for_replacement() {
        let transport = Arc::new(MemoryTransport::new());
        stub_claim(&transport);
        transport.stub_json(
            Method::Put,
            &format!("https://{}/api/v1/characters", OWN_HOST),
            200,
            json!({"status": "ok", "content": {"id": "ch1"}}),
        );

        let api = api_with(Arc::clone(&transport));
        api.upsert_character(&urls::profile(), json!({}), Some("ch1"))
            .await
            .unwrap();

        let put = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::Put)
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(put.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], "ch1");
    }
}
