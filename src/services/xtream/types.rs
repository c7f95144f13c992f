//! Xtream Codes API Types

use serde::{Deserialize, Deserializer, Serialize};

/// Provider host plus account, from which every Xtream URL is derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080"), no trailing slash
    pub server: String,
    pub username: String,
    pub password: String,
}

impl XtreamCredentials {
    /// Normalise a user-typed host: scheme added when missing, trailing `/` removed
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        let host = host.trim();
        let server = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        Self {
            server: server.trim_end_matches('/').to_string(),
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    fn query(&self) -> String {
        format!(
            "username={}&password={}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    fn path_segment(&self) -> String {
        format!(
            "{}/{}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    /// M3U Plus playlist synthesized from the account
    pub fn playlist_url(&self) -> String {
        format!("{}/get.php?{}&type=m3u_plus&output=ts", self.server, self.query())
    }

    /// player_api.php account endpoint
    pub fn api_url(&self) -> String {
        format!("{}/player_api.php?{}", self.server, self.query())
    }

    pub fn live_url(&self, stream_id: i64) -> String {
        format!("{}/live/{}/{}.ts", self.server, self.path_segment(), stream_id)
    }

    pub fn vod_url(&self, stream_id: i64, extension: &str) -> String {
        format!("{}/movie/{}/{}.{}", self.server, self.path_segment(), stream_id, extension)
    }

    pub fn series_url(&self, episode_id: i64, extension: &str) -> String {
        format!("{}/series/{}/{}.{}", self.server, self.path_segment(), episode_id, extension)
    }

    /// XMLTV guide URL
    pub fn epg_url(&self) -> String {
        format!("{}/xmltv.php?{}", self.server, self.query())
    }
}

/// Panels disagree on whether numeric fields are strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Response of player_api.php without an action
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamAuthResponse {
    pub user_info: XtreamUserInfo,
    #[serde(default)]
    pub server_info: XtreamServerInfo,
}

/// User account information
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct XtreamUserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub auth: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub exp_date: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub is_trial: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub active_cons: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub max_connections: Option<String>,
    #[serde(default)]
    pub allowed_output_formats: Vec<String>,
}

impl XtreamUserInfo {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }

    /// Expiration as a UTC date, when the panel reports one
    pub fn expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let ts: i64 = self.exp_date.as_ref()?.parse().ok()?;
        chrono::DateTime::from_timestamp(ts, 0)
    }

    pub fn is_trial_account(&self) -> bool {
        self.is_trial.as_deref() == Some("1")
    }
}

/// Server information
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct XtreamServerInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub https_port: Option<String>,
    #[serde(default)]
    pub server_protocol: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub time_now: Option<String>,
}
