//! CLI command implementations.

pub mod add;
pub mod delete;
pub mod list;
pub mod status;
pub mod sync;

use tally_remote::RemoteConfig;

/// Builds the remote configuration from the environment.
pub fn remote_config_from_env() -> RemoteConfig {
    let endpoint = std::env::var("TALLY_REMOTE_URL").unwrap_or_default();
    let mut config = RemoteConfig::new(endpoint);
    if let Ok(token) = std::env::var("TALLY_REMOTE_TOKEN") {
        if !token.is_empty() {
            config = config.with_auth_token(token);
        }
    }
    config
}
