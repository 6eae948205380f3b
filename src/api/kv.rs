//! Credentialed key-value storage on the own host
//!
//! Opaque string values; an empty content field reads as absent.

use crate::model::wire::WireKv;
use crate::transport::{HttpRequest, Method};
use crate::types::Result;

use super::Api;

impl Api {
    /// Read an opaque value, `None` when unset or empty.
    pub async fn read_kv(&self, key: &str) -> Result<Option<String>> {
        let request = HttpRequest::get(self.own_url(&format!("/kv/{}", key)));
        let response = self.session.authorized_fetch(request).await?.ensure_success()?;
        let kv: WireKv = response.json()?;

        Ok((!kv.content.is_empty()).then_some(kv.content))
    }

    /// Write an opaque value.
    pub async fn write_kv(&self, key: &str, value: &str) -> Result<()> {
        let request =
            HttpRequest::new(Method::Put, self.own_url(&format!("/kv/{}", key))).with_body(value);
        self.session.authorized_fetch(request).await?.ensure_success()?;
        Ok(())
    }
}
