//! Stream loader, write operations, and multi-host range queries
//!
//! Recent/range queries fan out: references are partitioned by host, one
//! request per host runs in parallel, and the merge step establishes the only
//! global ordering (see [`crate::query`]). Per-host transport failures fail
//! the query; only references with no resolvable host are skipped.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::keys;
use crate::model::wire::WireStream;
use crate::model::{Ccid, CreatedObject, ObjectKind, Stream, StreamElement};
use crate::query::{merge_elements, partition_streams, split_stream_ref};
use crate::transport::{HttpRequest, Method, Transport};
use crate::types::Result;

use super::Api;

/// Role grants attached to a stream on create/update
#[derive(Debug, Clone, Default)]
pub struct StreamGrants {
    pub maintainer: Vec<Ccid>,
    pub writer: Vec<Ccid>,
    pub reader: Vec<Ccid>,
}

#[derive(Serialize)]
struct StreamPutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(rename = "signedObject")]
    signed_object: &'a str,
    signature: &'a str,
}

impl Api {
    /// Create a signed stream on the own host.
    pub async fn create_stream<T: Serialize>(
        &self,
        schema: &str,
        body: T,
        grants: StreamGrants,
    ) -> Result<CreatedObject> {
        self.put_stream(None, schema, body, grants).await
    }

    /// Re-sign and replace an existing stream, dropping its cached copy.
    pub async fn update_stream<T: Serialize>(
        &self,
        id: &str,
        schema: &str,
        body: T,
        grants: StreamGrants,
    ) -> Result<CreatedObject> {
        let updated = self.put_stream(Some(id), schema, body, grants).await?;
        self.invalidate_stream(id);
        Ok(updated)
    }

    async fn put_stream<T: Serialize>(
        &self,
        id: Option<&str>,
        schema: &str,
        body: T,
        grants: StreamGrants,
    ) -> Result<CreatedObject> {
        let mut object = self.new_signed_object(ObjectKind::Stream, schema, body);
        object.maintainer = Some(grants.maintainer);
        object.writer = Some(grants.writer);
        object.reader = Some(grants.reader);
        let (canonical, signature) = self.sign_object(&object)?;

        let request = HttpRequest::new(Method::Put, self.own_url("/stream")).with_json(
            &StreamPutRequest {
                id,
                signed_object: &canonical,
                signature: &signature,
            },
        )?;

        let response = self.session.authorized_fetch(request).await?.ensure_success()?;
        let created: CreatedObject = response.json()?;

        debug!(id = %created.id, schema = %schema, "stream written");
        Ok(created)
    }

    /// Load a stream by reference (`key` or `key@host`; no suffix means the
    /// own host). The returned stream keeps the reference as its id.
    pub async fn read_stream(&self, reference: &str) -> Result<Option<Stream>> {
        let cache_key = keys::stream(reference);
        let (stream_key, host) = split_stream_ref(reference);
        let host = host.filter(|h| !h.is_empty()).unwrap_or(&self.config.host);
        let url = self.url(host, &format!("/stream?stream={}", stream_key));
        let transport = Arc::clone(&self.transport);
        let reference = reference.to_string();

        self.streams
            .get_or_load(&cache_key, || fetch_stream(transport, url, reference))
            .await
    }

    /// Drop the cached copy of a stream
    pub fn invalidate_stream(&self, reference: &str) {
        self.streams.invalidate(&keys::stream(reference));
    }

    /// List a host's streams carrying the given schema (own host when
    /// `remote` is `None`). Not cached: listings change as streams appear.
    pub async fn list_streams_by_schema(
        &self,
        schema: &str,
        remote: Option<&str>,
    ) -> Result<Vec<Stream>> {
        let host = remote.unwrap_or(&self.config.host);
        let url = self.url(
            host,
            &format!("/stream/list?schema={}", urlencoding::encode(schema)),
        );

        let response = self.transport.fetch(HttpRequest::get(url)).await?.ensure_success()?;
        let wires: Vec<WireStream> = response.json()?;

        let mut streams = Vec::with_capacity(wires.len());
        for wire in wires {
            if let Some(stream) = wire.into_stream(None)? {
                streams.push(stream);
            }
        }
        Ok(streams)
    }

    /// Most recent elements across the given streams, merged host-by-host.
    pub async fn read_stream_recent(&self, streams: &[String]) -> Result<Vec<StreamElement>> {
        self.fan_out_query(streams, "/stream/recent", String::new()).await
    }

    /// Elements within the optional `since`/`until` cursor bounds across the
    /// given streams, merged host-by-host.
    pub async fn read_stream_ranged(
        &self,
        streams: &[String],
        until: Option<&str>,
        since: Option<&str>,
    ) -> Result<Vec<StreamElement>> {
        let mut cursor = String::new();
        if let Some(since) = since {
            cursor.push_str(&format!("&since={}", since));
        }
        if let Some(until) = until {
            cursor.push_str(&format!("&until={}", until));
        }

        self.fan_out_query(streams, "/stream/range", cursor).await
    }

    async fn fan_out_query(
        &self,
        streams: &[String],
        route: &str,
        cursor: String,
    ) -> Result<Vec<StreamElement>> {
        let plan = partition_streams(streams, &self.config.host);

        let mut requests = Vec::with_capacity(plan.len());
        for (host, stream_keys) in plan {
            let url = self.url(
                &host,
                &format!("{}?streams={}{}", route, stream_keys.join(","), cursor),
            );
            let transport = Arc::clone(&self.transport);

            requests.push(async move {
                let response = transport.fetch(HttpRequest::get(url)).await?.ensure_success()?;
                response.json::<Vec<StreamElement>>()
            });
        }

        let batches = futures::future::try_join_all(requests).await?;
        Ok(merge_elements(batches))
    }
}

async fn fetch_stream(
    transport: Arc<dyn Transport>,
    url: String,
    reference: String,
) -> Result<Option<Stream>> {
    let response = transport.fetch(HttpRequest::get(url)).await?.ensure_success()?;
    let wire: WireStream = response.json()?;
    wire.into_stream(Some(&reference))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api_with, stub_claim, OWN_HOST};
    use super::*;
    use crate::schemas::urls;
    use crate::transport::memory::MemoryTransport;
    use serde_json::json;

    fn stream_payload(body: serde_json::Value) -> String {
        serde_json::to_string(&json!({
            "signer": "ccBob",
            "type": "Stream",
            "schema": urls::common_stream(),
            "body": body,
            "meta": {"client": "other"},
            "signedAt": "2024-05-01T12:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_stream_uses_host_suffix_and_keeps_reference_id() {
        let transport = Arc::new(MemoryTransport::new());
        transport.stub_json(
            Method::Get,
            "https://beta.example/api/v1/stream?stream=s1",
            200,
            json!({
                "id": "s1",
                "author": "ccBob",
                "schema": urls::common_stream(),
                "payload": stream_payload(json!({"name": "general"})),
                "writer": []
            }),
        );

        let api = api_with(Arc::clone(&transport));

        let stream = api.read_stream("s1@beta.example").await.unwrap().unwrap();
        assert_eq!(stream.id, "s1@beta.example");
        assert_eq!(stream.payload["name"], json!("general"));

        // cached under the composite reference
        api.read_stream("s1@beta.example").await.unwrap();
        assert_eq!(
            transport.count_for(Method::Get, "https://beta.example/api/v1/stream?stream=s1"),
            1
        );
    }

    #[tokio::test]
    async fn test_fan_out_partitions_hosts_and_merges() {
        let transport = Arc::new(MemoryTransport::new());
        transport.stub_json(
            Method::Get,
            "https://h1/api/v1/stream/recent?streams=s1,s3",
            200,
            json!([
                {"id": "a", "timestamp": "10-5"},
                {"id": "b", "timestamp": "10-3"}
            ]),
        );
        transport.stub_json(
            Method::Get,
            "https://h2/api/v1/stream/recent?streams=s2",
            200,
            json!([{"id": "a", "timestamp": "10-5"}]),
        );

        let api = api_with(Arc::clone(&transport));

        let elements = api
            .read_stream_recent(&[
                "s1@h1".to_string(),
                "s2@h2".to_string(),
                "s3@h1".to_string(),
            ])
            .await
            .unwrap();

        // exactly one request per host
        assert_eq!(
            transport.count_for(Method::Get, "https://h1/api/v1/stream/recent?streams=s1,s3"),
            1
        );
        assert_eq!(
            transport.count_for(Method::Get, "https://h2/api/v1/stream/recent?streams=s2"),
            1
        );

        // merged: dedup by id, descending timestamp
        let ids: Vec<&str> = elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_fan_out_propagates_per_host_failure() {
        let transport = Arc::new(MemoryTransport::new());
        transport.stub_json(
            Method::Get,
            "https://h1/api/v1/stream/recent?streams=s1",
            200,
            json!([]),
        );
        // h2 is unscripted and answers 404

        let api = api_with(transport);

        let err = api
            .read_stream_recent(&["s1@h1".to_string(), "s2@h2".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_status(404));
    }

    #[tokio::test]
    async fn test_ranged_query_carries_cursor_bounds() {
        let transport = Arc::new(MemoryTransport::new());
        let url = format!(
            "https://{}/api/v1/stream/range?streams=s1&since=5-0&until=9-0",
            OWN_HOST
        );
        transport.stub_json(Method::Get, &url, 200, json!([]));

        let api = api_with(Arc::clone(&transport));

        api.read_stream_ranged(&["s1".to_string()], Some("9-0"), Some("5-0"))
            .await
            .unwrap();
        assert_eq!(transport.count_for(Method::Get, &url), 1);
    }

    #[tokio::test]
    async fn test_create_stream_sends_grants_and_returns_id() {
        let transport = Arc::new(MemoryTransport::new());
        stub_claim(&transport);
        transport.stub_json(
            Method::Put,
            &format!("https://{}/api/v1/stream", OWN_HOST),
            200,
            json!({"id": "st1", "author": "ccMe"}),
        );

        let api = api_with(Arc::clone(&transport));

        let created = api
            .create_stream(
                &urls::utility_stream(),
                json!({}),
                StreamGrants {
                    writer: vec!["ccMe".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.id, "st1");

        let put = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::Put)
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(put.body.as_deref().unwrap()).unwrap();
        let canonical: serde_json::Value =
            serde_json::from_str(body["signedObject"].as_str().unwrap()).unwrap();
        assert_eq!(canonical["writer"], json!(["ccMe"]));
        assert_eq!(canonical["type"], "Stream");
        assert!(body.get("id").is_none());
    }

    #[tokio::test]
    async fn test_list_streams_by_schema_decodes_payloads() {
        let transport = Arc::new(MemoryTransport::new());
        let url = format!(
            "https://remote.example/api/v1/stream/list?schema={}",
            urlencoding::encode(&urls::common_stream())
        );
        transport.stub_json(
            Method::Get,
            &url,
            200,
            json!([{
                "id": "s1",
                "author": "ccBob",
                "schema": urls::common_stream(),
                "payload": stream_payload(json!({"name": "general"}))
            }]),
        );

        let api = api_with(transport);

        let streams = api
            .list_streams_by_schema(&urls::common_stream(), Some("remote.example"))
            .await
            .unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].payload["name"], json!("general"));
    }
}
