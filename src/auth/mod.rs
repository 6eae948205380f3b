//! Session management
//!
//! Holds the bearer token for the user's own host and mints a new one when
//! absent or expired: a short-lived claim JWT signed with the entity's key is
//! exchanged at the host's claim endpoint for a bearer token.
//!
//! The token lives in a state machine behind a mutex that stays held across
//! the mint, so concurrent callers can never duplicate mint calls: the
//! second caller blocks until the first mint settles and then reuses its
//! token. Mint failure is fatal to the call that triggered it.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::wire::WireTokenGrant;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::{ApiError, Result};

/// Claim validity straddles "now" by five minutes on each side
const CLAIM_WINDOW_SECS: u64 = 5 * 60;

/// Refresh slightly before the token's own expiry
const EXPIRY_SKEW_SECS: u64 = 10;

/// Claim minted by the client and exchanged for a bearer token
#[derive(Debug, Serialize)]
struct ClaimSet {
    jti: String,
    iss: String,
    aud: String,
    iat: u64,
    nbf: u64,
    exp: u64,
}

#[derive(Debug)]
enum TokenState {
    NoToken,
    Valid { token: String, expires_at: u64 },
}

/// Credential/session manager for the user's own host
pub struct Session {
    host: String,
    ccid: String,
    signing_key: SigningKey,
    transport: Arc<dyn Transport>,
    state: Mutex<TokenState>,
}

impl Session {
    pub fn new(
        host: impl Into<String>,
        ccid: impl Into<String>,
        signing_key: SigningKey,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            host: host.into(),
            ccid: ccid.into(),
            signing_key,
            transport,
            state: Mutex::new(TokenState::NoToken),
        }
    }

    /// Current bearer token, minting one first if absent or expired.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let TokenState::Valid { token, expires_at } = &*state {
            if unix_now() + EXPIRY_SKEW_SECS < *expires_at {
                return Ok(token.clone());
            }
            debug!(ccid = %self.ccid, "bearer token expired");
        }

        let token = self.mint().await?;
        let expires_at = token_expiry(&token)?;
        *state = TokenState::Valid {
            token: token.clone(),
            expires_at,
        };

        Ok(token)
    }

    /// Perform a request with the current bearer token attached.
    pub async fn authorized_fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.bearer_token().await?;

        let response = self
            .transport
            .fetch(request.with_header("authorization", format!("Bearer {}", token)))
            .await?;

        if response.status == 401 || response.status == 403 {
            return Err(ApiError::Auth(format!(
                "token rejected: status {}: {}",
                response.status, response.body
            )));
        }

        Ok(response)
    }

    /// Drop the current token; the next call mints a fresh one.
    pub async fn reset(&self) {
        *self.state.lock().await = TokenState::NoToken;
    }

    async fn mint(&self) -> Result<String> {
        let claim = self.build_claim()?;
        let url = format!("https://{}{}/auth/claim", self.host, crate::API_PATH);

        let response = self
            .transport
            .fetch(HttpRequest::get(url).with_header("authorization", claim))
            .await?;

        if !response.is_success() {
            return Err(ApiError::Auth(format!(
                "claim rejected: status {}: {}",
                response.status, response.body
            )));
        }

        let grant: WireTokenGrant = response
            .json()
            .map_err(|e| ApiError::Auth(format!("claim response: {}", e)))?;

        info!(host = %self.host, ccid = %self.ccid, "minted bearer token");
        Ok(grant.jwt)
    }

    fn build_claim(&self) -> Result<String> {
        let now = unix_now();
        let claims = ClaimSet {
            jti: Uuid::new_v4().to_string(),
            iss: self.ccid.clone(),
            aud: self.host.clone(),
            iat: now,
            nbf: now.saturating_sub(CLAIM_WINDOW_SECS),
            exp: now + CLAIM_WINDOW_SECS,
        };

        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| ApiError::Signing(format!("key export failed: {}", e)))?;
        let key = EncodingKey::from_ed_der(der.as_bytes());

        Ok(encode(&Header::new(Algorithm::EdDSA), &claims, &key)?)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Read `exp` from a granted token without verifying it. Verification is
/// the server's job; the client only needs to know when to refresh.
fn token_expiry(token: &str) -> Result<u64> {
    #[derive(Deserialize)]
    struct ExpClaim {
        exp: u64,
    }

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ApiError::Auth("malformed bearer token".into()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ApiError::Auth("bearer token payload is not base64url".into()))?;

    let claim: ExpClaim = serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::Auth("bearer token payload unreadable".into()))?;

    Ok(claim.exp)
}
