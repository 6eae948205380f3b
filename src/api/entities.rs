//! Entity loader and host resolution
//!
//! The entity record is the authoritative answer to "where does this CCID
//! currently live". Every operation that must reach a remote CCID's
//! authoritative host resolves through here, with the same cache discipline
//! as every other loader.

use std::sync::Arc;

use tracing::debug;

use crate::cache::keys;
use crate::model::{Entity, HostProfile};
use crate::transport::{HttpRequest, Transport};
use crate::types::Result;

use super::Api;

impl Api {
    /// Load the entity record for a CCID.
    ///
    /// Absent entities (404, or a response without a ccid) resolve to `None`.
    pub async fn read_entity(&self, ccid: &str) -> Result<Option<Entity>> {
        let cache_key = keys::entity(ccid);
        let transport = Arc::clone(&self.transport);
        let url = self.own_url(&format!("/entity/{}", ccid));

        self.entities
            .get_or_load(&cache_key, || fetch_entity(transport, url))
            .await
    }

    /// Drop the cached entity record for a CCID
    pub fn invalidate_entity(&self, ccid: &str) {
        self.entities.invalidate(&keys::entity(ccid));
    }

    /// Authoritative host for a CCID's objects.
    ///
    /// Falls back to the caller's own configured host when the entity cannot
    /// be found or has no domain set. Transport errors propagate.
    pub async fn resolve_host(&self, ccid: &str) -> Result<String> {
        let entity = self.read_entity(ccid).await?;

        match entity {
            Some(entity) if !entity.domain.is_empty() => Ok(entity.domain),
            _ => {
                debug!(ccid = %ccid, fallback = %self.config.host, "no authoritative domain, using own host");
                Ok(self.config.host.clone())
            }
        }
    }

    /// Profile of a host (own host when `remote` is `None`)
    pub async fn host_profile(&self, remote: Option<&str>) -> Result<HostProfile> {
        let host = remote.unwrap_or(&self.config.host);
        let response = self
            .transport
            .fetch(HttpRequest::get(self.url(host, "/host")))
            .await?
            .ensure_success()?;
        response.json()
    }

    /// Hosts known to a host (own host when `remote` is `None`)
    pub async fn known_hosts(&self, remote: Option<&str>) -> Result<Vec<HostProfile>> {
        let host = remote.unwrap_or(&self.config.host);
        let response = self
            .transport
            .fetch(HttpRequest::get(self.url(host, "/host/list")))
            .await?
            .ensure_success()?;
        response.json()
    }
}

async fn fetch_entity(transport: Arc<dyn Transport>, url: String) -> Result<Option<Entity>> {
    let response = transport.fetch(HttpRequest::get(url)).await?;

    if response.status == 404 {
        return Ok(None);
    }

    let entity: Entity = response.ensure_success()?.json()?;
    if entity.ccid.is_empty() {
        return Ok(None);
    }

    Ok(Some(entity))
}
