//! Xtream Codes URL Detection and Validation
//!
//! Recognises Xtream playlist URLs and checks credentials against the panel.

use super::types::{XtreamAuthResponse, XtreamCredentials};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Request timeout for Xtream API calls
const XTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum XtreamError {
    #[error("Servidor não respondeu a tempo")]
    Timeout,
    #[error("Falha de conexão com o servidor: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Erro HTTP {0} do servidor Xtream")]
    Http(u16),
    #[error("Servidor retornou HTML em vez de JSON - credenciais provavelmente inválidas")]
    HtmlResponse,
    #[error("Resposta inválida do servidor: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("Conta não está ativa (status: {0})")]
    AccountInactive(String),
}

impl From<reqwest::Error> for XtreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            XtreamError::Timeout
        } else {
            XtreamError::Network(err)
        }
    }
}

/// Extract Xtream credentials from an M3U URL
///
/// Supported URL pattern:
/// - `http://server:port/get.php?username=X&password=Y&...`
pub fn extract_credentials(m3u_url: &str) -> Option<XtreamCredentials> {
    let parsed = match Url::parse(m3u_url) {
        Ok(url) => url,
        Err(e) => {
            debug!("Failed to parse URL: {}", e);
            return None;
        }
    };

    if !parsed.path().to_lowercase().ends_with("/get.php") {
        return None;
    }

    let params: HashMap<_, _> = parsed.query_pairs().collect();
    let username = params.get("username")?.to_string();
    let password = params.get("password")?.to_string();

    if username.is_empty() || password.is_empty() {
        debug!("Empty username or password in URL");
        return None;
    }

    let host = parsed.host_str()?;
    let port_suffix = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let server = format!("{}://{}{}", parsed.scheme(), host, port_suffix);

    debug!("Extracted Xtream credentials: server={}, username={}", server, username);

    Some(XtreamCredentials {
        server,
        username,
        password,
    })
}

/// Validate credentials against `{server}/player_api.php`
pub async fn validate_credentials(
    client: &Client,
    creds: &XtreamCredentials,
) -> Result<XtreamAuthResponse, XtreamError> {
    debug!("Validating Xtream credentials at: {}", creds.server);

    let response = client
        .get(creds.api_url())
        .timeout(Duration::from_secs(XTREAM_TIMEOUT_SECS))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(XtreamError::Http(status.as_u16()));
    }

    let text = response.text().await?;

    // Some panels answer bad logins with an HTML page
    if text.trim_start().starts_with('<') {
        return Err(XtreamError::HtmlResponse);
    }

    let auth: XtreamAuthResponse = serde_json::from_str(&text).map_err(|e| {
        debug!("Response text: {}", text.chars().take(500).collect::<String>());
        e
    })?;

    if !auth.user_info.is_active() {
        warn!("Xtream account {} is {}", auth.user_info.username, auth.user_info.status);
        return Err(XtreamError::AccountInactive(auth.user_info.status));
    }

    info!(
        "Xtream credentials validated. Account: {}, Status: {}, Expires: {:?}",
        auth.user_info.username, auth.user_info.status, auth.user_info.exp_date
    );

    Ok(auth)
}
