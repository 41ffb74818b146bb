//! Provider configuration.

use std::time::Duration;

use clap::Args;

pub const DEFAULT_AUTH_URL: &str = "https://sso.redhat.com/auth/realms/redhat-external";
pub const DEFAULT_CLIENT_ID: &str = "cloud-services";
pub const DEFAULT_API_URL: &str = "https://api.openshift.com";

/// Connection settings for the management APIs.
#[derive(Args, Debug, Clone)]
pub struct ProviderConfig {
    /// Offline token used to obtain access tokens
    #[arg(long, env = "OFFLINE_TOKEN", hide_env_values = true)]
    pub offline_token: String,

    /// SSO realm URL
    #[arg(long, env = "AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,

    /// SSO client ID
    #[arg(long, env = "CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    /// Kafka management API base URL
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Timeout for each remote call in seconds (0 = none)
    #[arg(long, default_value = "120")]
    pub timeout: u64,
}

impl ProviderConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/protocol/openid-connect/token",
            self.auth_url.trim_end_matches('/')
        )
    }

    pub fn kafkas_mgmt_url(&self) -> String {
        format!(
            "{}/api/kafkas_mgmt/v1",
            self.api_url.trim_end_matches('/')
        )
    }

    pub fn service_accounts_url(&self) -> String {
        format!(
            "{}/apis/service_accounts/v1",
            self.auth_url.trim_end_matches('/')
        )
    }
}
