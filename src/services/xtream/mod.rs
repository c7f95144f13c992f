//! Xtream Codes Integration
//!
//! Xtream Codes panels serve an M3U playlist synthesized from a host and an
//! account:
//! ```text
//! http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts
//! ```
//! and describe the account through the Player API:
//! ```text
//! http://server:port/player_api.php?username=X&password=Y
//! ```

pub mod detector;
pub mod types;

// Re-exports for convenience
pub use detector::{extract_credentials, validate_credentials, XtreamError};
pub use types::{XtreamAuthResponse, XtreamCredentials, XtreamServerInfo, XtreamUserInfo};
