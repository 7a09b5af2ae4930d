use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default Salesforce login host used when `SF_LOGIN_URL` is not set.
pub const DEFAULT_SF_LOGIN_URL: &str = "https://login.salesforce.com";
pub const DEFAULT_SF_API_VERSION: &str = "v59.0";
pub const DEFAULT_HUBSPOT_AUTH_URL: &str = "https://app.hubspot.com";
pub const DEFAULT_HUBSPOT_API_BASE_URL: &str = "https://api.hubapi.com";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Consumer key of the Salesforce connected app.
    #[arg(long, env)]
    sf_client_id: Option<String>,

    /// Consumer secret of the Salesforce connected app.
    #[arg(long, env, hide_env_values = true)]
    sf_client_secret: Option<String>,

    /// Callback URL registered with the Salesforce connected app.
    #[arg(
        long,
        env,
        default_value = "http://localhost:4000/api/sf/auth/callback"
    )]
    pub sf_redirect_uri: String,

    /// Host serving the Salesforce authorize and token endpoints.
    /// Use https://test.salesforce.com for sandboxes.
    #[arg(long, env, default_value = DEFAULT_SF_LOGIN_URL)]
    pub sf_login_url: String,

    /// Salesforce REST API version used for CRUD calls.
    #[arg(long, env, default_value = DEFAULT_SF_API_VERSION)]
    pub sf_api_version: String,

    /// Space separated OAuth scopes requested from Salesforce.
    #[arg(long, env, default_value = "api refresh_token")]
    pub sf_scopes: String,

    /// Username for the legacy password grant.
    #[arg(long, env)]
    sf_username: Option<String>,

    /// Password for the legacy password grant.
    #[arg(long, env, hide_env_values = true)]
    sf_password: Option<String>,

    /// Security token appended to the password, when the org requires one.
    #[arg(long, env, hide_env_values = true)]
    sf_security_token: Option<String>,

    /// Client ID of the HubSpot app.
    #[arg(long, env)]
    hubspot_client_id: Option<String>,

    /// Client secret of the HubSpot app.
    #[arg(long, env, hide_env_values = true)]
    hubspot_client_secret: Option<String>,

    /// Redirect URL registered with the HubSpot app.
    #[arg(
        long,
        env,
        default_value = "http://localhost:4000/api/hubspot/auth/callback"
    )]
    pub hubspot_redirect_uri: String,

    /// Host serving the HubSpot consent screen.
    #[arg(long, env, default_value = DEFAULT_HUBSPOT_AUTH_URL)]
    pub hubspot_auth_url: String,

    /// The base URL of the HubSpot API, also used for the token endpoint.
    /// Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_HUBSPOT_API_BASE_URL)]
    pub hubspot_api_base_url: String,

    /// Space separated OAuth scopes requested from HubSpot.
    #[arg(
        long,
        env,
        default_value = "crm.objects.contacts.read crm.objects.contacts.write crm.objects.companies.read crm.objects.companies.write"
    )]
    pub hubspot_scopes: String,

    /// Key material for signing session cookies. A random key is generated
    /// per process when unset, so sessions do not survive a restart.
    #[arg(long, env, hide_env_values = true)]
    session_secret: Option<String>,

    /// Session expiry after inactivity, in seconds.
    #[arg(long, env, default_value_t = 3600)]
    pub session_expiry_seconds: u64,

    /// Timeout in seconds for every outbound call to a provider.
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap_or(RustEnv::Development)),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn sf_client_id(&self) -> Option<String> {
        self.sf_client_id.clone()
    }

    pub fn sf_client_secret(&self) -> Option<String> {
        self.sf_client_secret.clone()
    }

    pub fn sf_username(&self) -> Option<String> {
        self.sf_username.clone()
    }

    pub fn sf_password(&self) -> Option<String> {
        self.sf_password.clone()
    }

    pub fn sf_security_token(&self) -> Option<String> {
        self.sf_security_token.clone()
    }

    pub fn hubspot_client_id(&self) -> Option<String> {
        self.hubspot_client_id.clone()
    }

    pub fn hubspot_client_secret(&self) -> Option<String> {
        self.hubspot_client_secret.clone()
    }

    pub fn session_secret(&self) -> Option<&str> {
        self.session_secret.as_deref()
    }

    /// Point both providers at one base URL, used by tests against a mock server.
    pub fn set_provider_base_url(mut self, base_url: &str) -> Self {
        self.sf_login_url = base_url.to_string();
        self.hubspot_auth_url = base_url.to_string();
        self.hubspot_api_base_url = base_url.to_string();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
