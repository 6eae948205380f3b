//! Association loader and write operations
//!
//! Associations live on the target author's authoritative host, so every
//! operation here resolves the host first. Deleting an association reveals
//! its target; the target's cached copy is invalidated too, since derived
//! counts on it are now stale.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::cache::keys;
use crate::model::wire::WireAssociationEnvelope;
use crate::model::{
    Association, CreatedObject, DeletedAssociation, ObjectKind, ResponseEnvelope, TargetType,
};
use crate::transport::{HttpRequest, Method, Transport};
use crate::types::Result;

use super::Api;

#[derive(Serialize)]
struct AssociationPostRequest<'a> {
    #[serde(rename = "targetType")]
    target_type: TargetType,
    #[serde(rename = "signedObject")]
    signed_object: &'a str,
    signature: &'a str,
    streams: &'a [String],
}

impl Api {
    /// Create a signed association on the target author's host.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_association<T: Serialize>(
        &self,
        schema: &str,
        body: T,
        target: &str,
        target_author: &str,
        target_type: TargetType,
        streams: &[String],
    ) -> Result<ResponseEnvelope<CreatedObject>> {
        let host = self.resolve_host(target_author).await?;

        let mut object = self.new_signed_object(ObjectKind::Association, schema, body);
        object.target = Some(target.to_string());
        let (canonical, signature) = self.sign_object(&object)?;

        let request = HttpRequest::new(Method::Post, self.url(&host, "/associations")).with_json(
            &AssociationPostRequest {
                target_type,
                signed_object: &canonical,
                signature: &signature,
                streams,
            },
        )?;

        let response = self.session.authorized_fetch(request).await?.ensure_success()?;
        let envelope: ResponseEnvelope<CreatedObject> = response.json()?;

        debug!(
            id = %envelope.content.id,
            target = %target,
            target_type = target_type.as_str(),
            "association created"
        );
        Ok(envelope)
    }

    /// Load an association by id from `host` (own host when `None`).
    pub async fn read_association(&self, id: &str, host: Option<&str>) -> Result<Option<Association>> {
        let cache_key = keys::association(id);
        let host = host.filter(|h| !h.is_empty()).unwrap_or(&self.config.host);
        let url = self.url(host, &format!("/associations/{}", id));
        let transport = Arc::clone(&self.transport);

        self.associations
            .get_or_load(&cache_key, || fetch_association(transport, url))
            .await
    }

    /// Load an association from its owner's authoritative host.
    pub async fn read_association_with_owner(
        &self,
        id: &str,
        owner: &str,
    ) -> Result<Option<Association>> {
        let host = self.resolve_host(owner).await?;
        self.read_association(id, Some(&host)).await
    }

    /// Delete an association on the target author's host.
    ///
    /// Invalidates the association's own cache entry and, when the delete
    /// result reveals a message target, that message's entry.
    pub async fn delete_association(
        &self,
        id: &str,
        target_author: &str,
    ) -> Result<ResponseEnvelope<DeletedAssociation>> {
        let host = self.resolve_host(target_author).await?;

        let request = HttpRequest::new(Method::Delete, self.url(&host, "/associations"))
            .with_json(&json!({ "id": id }))?;

        let response = self.session.authorized_fetch(request).await?.ensure_success()?;
        let envelope: ResponseEnvelope<DeletedAssociation> = response.json()?;

        self.invalidate_association(id);
        if envelope.content.target_type == TargetType::Messages
            && !envelope.content.target_id.is_empty()
        {
            self.invalidate_message(&envelope.content.target_id);
        }

        debug!(id = %id, target = %envelope.content.target_id, "association deleted");
        Ok(envelope)
    }

    /// Drop the cached copy of an association
    pub fn invalidate_association(&self, id: &str) {
        self.associations.invalidate(&keys::association(id));
    }
}

async fn fetch_association(transport: Arc<dyn Transport>, url: String) -> Result<Option<Association>> {
    let response = transport.fetch(HttpRequest::get(url)).await?.ensure_success()?;
    let envelope: WireAssociationEnvelope = response.json()?;

    match envelope.association {
        Some(wire) => wire.into_association(),
        None => Ok(None),
    }
}
