//! Loose model of `app/preferences`, used only as a login/health probe
//! (SPEC_FULL §4.3).

use serde::Deserialize;

use crate::error::Result;

use super::Request;

/// The service never inspects more than these fields, so the rest of the
/// (much larger) upstream payload is simply ignored by serde.
#[derive(Debug, Clone, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub dht: bool,
    #[serde(default)]
    pub up_limit: i64,
    #[serde(default)]
    pub alt_up_limit: i64,
}

impl super::Client {
    /// Used at startup and by `/health` as a cheap "is the session still
    /// good" probe (SPEC_FULL §4.3).
    pub async fn get_preferences(&self) -> Result<Preferences> {
        let res = self.call(Request::get("api/v2/app/preferences")).await?;
        Ok(res.json::<Preferences>().await?)
    }
}
