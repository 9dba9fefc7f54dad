//! Login/logout against the qBittorrent Web API (spec §4.3).

use reqwest::header::{self, HeaderMap};

use crate::error::{AppError, Result};

impl super::Client {
    /// Authenticates and stores the resulting `SID` cookie. Called once at
    /// startup and again, transparently, whenever a call comes back 403.
    pub(super) async fn login(&self) -> Result<()> {
        let url = self.build_url("api/v2/auth/login")?;
        let body = format!(
            "username={}&password={}",
            urlencode(&self.username),
            urlencode(&self.password)
        );

        let res = self
            .http_client
            .post(url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::REFERER, self.base_url.to_string())
            .body(body)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AppError::Auth);
        }

        let sid = res
            .cookies()
            .find(|c| c.name() == "SID")
            .map(|c| c.value().to_string());

        let Some(sid) = sid else {
            return Err(AppError::Auth);
        };

        *self.sid.write().await = Some(sid);
        Ok(())
    }

    pub(super) async fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(sid) = self.sid.read().await.clone() {
            let cookie = format!("SID={sid}");
            if let Ok(value) = cookie.parse() {
                headers.insert(header::COOKIE, value);
            }
        }
        headers
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
