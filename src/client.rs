//! Client facade
//!
//! Composes the loaders, caches, and signing pipeline into the operations
//! applications call. Helpers that deliver notifications (favorite, reaction,
//! reply, reroute, ack) resolve their destination streams through
//! [`Client::resolve_delivery_streams`]; a failed lookup degrades to fewer
//! target streams with a warning, but errors from the primary create are
//! never masked.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::api::{Api, StreamGrants};
use crate::config::ClientConfig;
use crate::model::{
    Association, Ccid, Character, CreatedObject, DeletedAssociation, Entity, Message,
    ResponseEnvelope, Stream, TargetType,
};
use crate::schemas::bodies::{
    CommonStream, EmojiAssociation, Like, Profile, ReplyAssociation, ReplyMessage,
    RerouteAssociation, RerouteMessage, SimpleNote, UserAck, Userstreams, UtilityStream,
};
use crate::schemas::{urls, TypedBody};
use crate::transport::Transport;
use crate::types::{ApiError, Result};

/// Composite view of a user: the entity record plus its profile and
/// userstreams characters
#[derive(Debug, Clone)]
pub struct User {
    pub entity: Entity,
    pub profile: Option<Character>,
    pub userstreams: Option<Character>,
}

/// Destination streams for notification delivery between two actors.
///
/// `None` slots mean the actor has no stream configured. A failed lookup is
/// different: it surfaces as an error from
/// [`Client::resolve_delivery_streams`].
#[derive(Debug, Clone, Default)]
pub struct DeliveryPlan {
    /// Target author's notification stream
    pub author_notification: Option<String>,

    /// Own association stream
    pub own_association: Option<String>,
}

impl DeliveryPlan {
    pub fn stream_ids(&self) -> Vec<String> {
        [&self.author_notification, &self.own_association]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.author_notification.is_none() && self.own_association.is_none()
    }
}

/// High-level client over the typed data-access layer
pub struct Client {
    api: Api,
}

impl Client {
    /// Build a client over the real HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            api: Api::new(config)?,
        })
    }

    /// Build a client over any transport implementation
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            api: Api::with_transport(config, transport)?,
        })
    }

    /// The underlying data-access layer
    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn ccid(&self) -> &str {
        self.api.ccid()
    }

    pub fn host(&self) -> &str {
        self.api.host()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a user: entity record plus profile and userstreams characters.
    pub async fn get_user(&self, ccid: &str) -> Result<Option<User>> {
        let Some(entity) = self.api.read_entity(ccid).await? else {
            return Ok(None);
        };

        let profile = self.api.read_character(ccid, &urls::profile()).await?;
        let userstreams = self.api.read_character(ccid, &urls::userstreams()).await?;

        Ok(Some(User {
            entity,
            profile,
            userstreams,
        }))
    }

    /// Load a message from its author's authoritative host.
    pub async fn get_message(&self, id: &str, author: &str) -> Result<Option<Message>> {
        self.api.read_message_with_author(id, author).await
    }

    /// Load an association from its owner's authoritative host.
    pub async fn get_association(&self, id: &str, owner: &str) -> Result<Option<Association>> {
        self.api.read_association_with_owner(id, owner).await
    }

    /// Load a stream by `key` or `key@host` reference.
    pub async fn get_stream(&self, reference: &str) -> Result<Option<Stream>> {
        self.api.read_stream(reference).await
    }

    // =========================================================================
    // Delivery streams
    // =========================================================================

    /// Resolve the destination streams for notifying `target_author` about an
    /// action of this identity.
    ///
    /// `Err` means a lookup failed; `Ok` with empty slots means the actors
    /// have no streams configured.
    pub async fn resolve_delivery_streams(&self, target_author: &str) -> Result<DeliveryPlan> {
        let own_ccid = self.api.ccid().to_string();

        let author_notification = self
            .userstreams_of(target_author)
            .await?
            .and_then(|u| u.notification_stream);
        let own_association = self
            .userstreams_of(&own_ccid)
            .await?
            .and_then(|u| u.association_stream);

        Ok(DeliveryPlan {
            author_notification,
            own_association,
        })
    }

    async fn userstreams_of(&self, ccid: &str) -> Result<Option<Userstreams>> {
        match self.api.read_character(ccid, &urls::userstreams()).await? {
            Some(character) => Ok(Some(character.payload.decode_body()?)),
            None => Ok(None),
        }
    }

    async fn delivery_streams_or_fewer(&self, target_author: &str) -> Vec<String> {
        match self.resolve_delivery_streams(target_author).await {
            Ok(plan) => plan.stream_ids(),
            Err(e) => {
                warn!(
                    target = %target_author,
                    error = %e,
                    "delivery stream discovery failed, sending with fewer target streams"
                );
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Post a plain note to the given streams.
    pub async fn create_current(&self, body: &str, streams: &[String]) -> Result<CreatedObject> {
        let envelope = self
            .api
            .create_message(
                &SimpleNote::schema_url(),
                SimpleNote {
                    body: body.to_string(),
                    ..Default::default()
                },
                streams,
            )
            .await?;
        Ok(envelope.content)
    }

    /// Delete one of this identity's messages.
    pub async fn delete_message(&self, id: &str) -> Result<()> {
        self.api.delete_message(id, None).await?;
        Ok(())
    }

    /// Reply to a message: creates the reply note, then the reply association
    /// on the target author's host, and invalidates the target.
    pub async fn reply_to_message(
        &self,
        target_id: &str,
        target_author: &str,
        streams: &[String],
        body: &str,
    ) -> Result<CreatedObject> {
        let created = self
            .api
            .create_message(
                &ReplyMessage::schema_url(),
                ReplyMessage {
                    body: body.to_string(),
                    reply_to_message_id: target_id.to_string(),
                    reply_to_message_author: target_author.to_string(),
                    emojis: Default::default(),
                },
                streams,
            )
            .await?
            .content;

        let delivery = self.delivery_streams_or_fewer(target_author).await;
        self.api
            .create_association(
                &ReplyAssociation::schema_url(),
                ReplyAssociation {
                    message_id: created.id.clone(),
                    message_author: self.api.ccid().to_string(),
                },
                target_id,
                target_author,
                TargetType::Messages,
                &delivery,
            )
            .await?;

        self.api.invalidate_message(target_id);
        Ok(created)
    }

    /// Reroute (boost) a message into the given streams.
    pub async fn reroute_message(
        &self,
        target_id: &str,
        target_author: &str,
        streams: &[String],
        body: Option<&str>,
    ) -> Result<CreatedObject> {
        let created = self
            .api
            .create_message(
                &RerouteMessage::schema_url(),
                RerouteMessage {
                    body: body.map(str::to_string),
                    reroute_message_id: target_id.to_string(),
                    reroute_message_author: target_author.to_string(),
                },
                streams,
            )
            .await?
            .content;

        let delivery = self.delivery_streams_or_fewer(target_author).await;
        self.api
            .create_association(
                &RerouteAssociation::schema_url(),
                RerouteAssociation {
                    message_id: created.id.clone(),
                    message_author: self.api.ccid().to_string(),
                },
                target_id,
                target_author,
                TargetType::Messages,
                &delivery,
            )
            .await?;

        self.api.invalidate_message(target_id);
        Ok(created)
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// Favorite a message and invalidate its cached copy so recomputed
    /// association counts are fetched fresh.
    pub async fn favorite_message(&self, id: &str, author: &str) -> Result<()> {
        let delivery = self.delivery_streams_or_fewer(author).await;
        self.api
            .create_association(
                &Like::schema_url(),
                Like::default(),
                id,
                author,
                TargetType::Messages,
                &delivery,
            )
            .await?;

        self.api.invalidate_message(id);
        Ok(())
    }

    /// React to a message with a custom emoji.
    pub async fn add_message_reaction(
        &self,
        id: &str,
        author: &str,
        shortcode: &str,
        image_url: &str,
    ) -> Result<()> {
        let delivery = self.delivery_streams_or_fewer(author).await;
        self.api
            .create_association(
                &EmojiAssociation::schema_url(),
                EmojiAssociation {
                    shortcode: shortcode.to_string(),
                    image_url: image_url.to_string(),
                },
                id,
                author,
                TargetType::Messages,
                &delivery,
            )
            .await?;

        self.api.invalidate_message(id);
        Ok(())
    }

    /// Remove a favorite/reaction; the revealed target message is
    /// invalidated by the delete itself.
    pub async fn unfavorite_message(
        &self,
        association_id: &str,
        author: &str,
    ) -> Result<DeletedAssociation> {
        let envelope = self.api.delete_association(association_id, author).await?;
        Ok(envelope.content)
    }

    // =========================================================================
    // Acknowledgements
    // =========================================================================

    /// Acknowledge another user by attaching an ack edge to their profile.
    pub async fn ack_user(&self, target: &str) -> Result<CreatedObject> {
        let user = self
            .get_user(target)
            .await?
            .ok_or_else(|| ApiError::Domain(format!("entity {} not found", target)))?;

        let profile = user
            .profile
            .ok_or_else(|| ApiError::Domain(format!("user {} has no profile to ack", target)))?;

        let delivery = self.delivery_streams_or_fewer(target).await;
        let envelope = self
            .api
            .create_association(
                &UserAck::schema_url(),
                UserAck::default(),
                &profile.id,
                target,
                TargetType::Characters,
                &delivery,
            )
            .await?;

        self.api.invalidate_character(target, &urls::profile());
        Ok(envelope.content)
    }

    /// Withdraw an acknowledgement.
    pub async fn unack_user(&self, association_id: &str, target: &str) -> Result<()> {
        let envelope = self.api.delete_association(association_id, target).await?;

        if envelope.content.target_type == TargetType::Characters {
            self.api.invalidate_character(target, &urls::profile());
        }

        Ok(())
    }

    // =========================================================================
    // Profiles and streams
    // =========================================================================

    /// Create this identity's profile character.
    pub async fn create_profile(
        &self,
        username: &str,
        description: &str,
        avatar: &str,
        banner: &str,
    ) -> Result<ResponseEnvelope<CreatedObject>> {
        self.put_profile(None, username, description, avatar, banner).await
    }

    /// Replace this identity's profile character in place.
    pub async fn update_profile(
        &self,
        id: &str,
        username: &str,
        description: &str,
        avatar: &str,
        banner: &str,
    ) -> Result<ResponseEnvelope<CreatedObject>> {
        self.put_profile(Some(id), username, description, avatar, banner).await
    }

    async fn put_profile(
        &self,
        id: Option<&str>,
        username: &str,
        description: &str,
        avatar: &str,
        banner: &str,
    ) -> Result<ResponseEnvelope<CreatedObject>> {
        self.api
            .upsert_character(
                &Profile::schema_url(),
                Profile {
                    username: username.to_string(),
                    description: description.to_string(),
                    avatar: avatar.to_string(),
                    banner: banner.to_string(),
                },
                id,
            )
            .await
    }

    /// Public topic streams carried by a host.
    pub async fn common_streams(&self, remote: Option<&str>) -> Result<Vec<Stream>> {
        self.api
            .list_streams_by_schema(&urls::common_stream(), remote)
            .await
    }

    /// Create a public topic stream on the own host.
    pub async fn create_common_stream(
        &self,
        name: &str,
        description: &str,
    ) -> Result<CreatedObject> {
        self.api
            .create_stream(
                &CommonStream::schema_url(),
                CommonStream {
                    name: name.to_string(),
                    shortname: name.to_string(),
                    description: description.to_string(),
                },
                StreamGrants::default(),
            )
            .await
    }

    // =========================================================================
    // Userstreams
    // =========================================================================

    /// Ensure this identity's home / notification / association streams exist
    /// and are recorded in its userstreams character. Streams already
    /// configured are kept.
    pub async fn setup_userstreams(&self) -> Result<Userstreams> {
        let own_ccid = self.api.ccid().to_string();

        let existing = self.api.read_character(&own_ccid, &urls::userstreams()).await?;
        let existing_id = existing.as_ref().map(|c| c.id.clone());
        let current: Userstreams = match &existing {
            Some(character) => character.payload.decode_body()?,
            None => Userstreams::default(),
        };

        let home_stream = match current.home_stream {
            Some(id) => Some(id),
            None => {
                let created = self
                    .api
                    .create_stream(
                        &urls::utility_stream(),
                        UtilityStream::default(),
                        StreamGrants {
                            writer: vec![own_ccid.clone()],
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(id = %created.id, "created home stream");
                Some(created.id)
            }
        };

        let notification_stream = match current.notification_stream {
            Some(id) => Some(id),
            None => {
                let created = self
                    .api
                    .create_stream(
                        &urls::utility_stream(),
                        UtilityStream::default(),
                        StreamGrants::default(),
                    )
                    .await?;
                info!(id = %created.id, "created notification stream");
                Some(created.id)
            }
        };

        let association_stream = match current.association_stream {
            Some(id) => Some(id),
            None => {
                let created = self
                    .api
                    .create_stream(
                        &urls::utility_stream(),
                        UtilityStream::default(),
                        StreamGrants {
                            writer: vec![own_ccid.clone()],
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(id = %created.id, "created association stream");
                Some(created.id)
            }
        };

        let body = Userstreams {
            home_stream,
            notification_stream,
            association_stream,
        };

        self.api
            .upsert_character(&urls::userstreams(), body.clone(), existing_id.as_deref())
            .await?;

        Ok(body)
    }

    /// Home stream references (`key@domain`) for a set of users, resolved in
    /// parallel. Users without a configured home stream are skipped, as are
    /// per-user lookup failures (with a warning).
    pub async fn user_home_streams(&self, users: &[Ccid]) -> Vec<String> {
        let lookups = users.iter().map(|ccid| self.home_stream_of(ccid));
        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn home_stream_of(&self, ccid: &str) -> Option<String> {
        let entity = match self.api.read_entity(ccid).await {
            Ok(entity) => entity,
            Err(e) => {
                warn!(ccid = %ccid, error = %e, "entity lookup failed, skipping home stream");
                return None;
            }
        };

        let userstreams = match self.userstreams_of(ccid).await {
            Ok(userstreams) => userstreams,
            Err(e) => {
                warn!(ccid = %ccid, error = %e, "userstreams lookup failed, skipping home stream");
                return None;
            }
        };

        let mut reference = userstreams?.home_stream?;
        if let Some(entity) = entity {
            if !entity.domain.is_empty() {
                reference = format!("{}@{}", reference, entity.domain);
            }
        }

        Some(reference)
    }
}
