//! Service configuration.

use std::str::FromStr;

use clap::Parser;

/// Service configuration loaded from flags and environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_uri: Option<String>,

    /// Accrual service base URL. `None` disables the reconciler.
    pub accrual_address: Option<String>,

    /// HMAC secret for session tokens.
    pub auth_secret: String,

    /// Session token lifetime in seconds.
    pub session_ttl_seconds: u64,

    /// Accrual service request timeout in seconds.
    pub accrual_timeout_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Command-line flags.
///
/// Each flag has an environment variable that takes precedence over it when
/// set to a non-empty value.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "loyalty-service",
    about = "Loyalty points API and accrual reconciler",
    version
)]
pub struct CliArgs {
    /// Address to listen on (`RUN_ADDRESS`). `:8080` binds every interface.
    #[arg(short = 'a', value_name = "addr")]
    pub run_address: Option<String>,

    /// PostgreSQL connection string (`DATABASE_URI`).
    #[arg(short = 'd', value_name = "uri")]
    pub database_uri: Option<String>,

    /// Accrual service base URL (`ACCRUAL_SYSTEM_ADDRESS`).
    #[arg(short = 'r', value_name = "url")]
    pub accrual_address: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from command-line flags, overridden by the
    /// environment.
    #[must_use]
    pub fn from_args(args: CliArgs) -> Self {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    fn resolve(args: CliArgs, env: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let parsed = |name: &str, default| parse_or(var(name), default);
        let defaults = Self::default();

        let auth_secret = var("AUTH_SECRET").unwrap_or_else(|| {
            tracing::warn!(
                "AUTH_SECRET not set - using a random secret; sessions will not survive a restart"
            );
            defaults.auth_secret
        });

        let listen_addr = var("RUN_ADDRESS")
            .or(non_empty(args.run_address))
            .map_or(defaults.listen_addr, |addr| normalize_listen_addr(&addr));

        Self {
            listen_addr,
            database_uri: var("DATABASE_URI").or(non_empty(args.database_uri)),
            accrual_address: var("ACCRUAL_SYSTEM_ADDRESS").or(non_empty(args.accrual_address)),
            auth_secret,
            session_ttl_seconds: parsed("SESSION_TTL_SECONDS", defaults.session_ttl_seconds),
            accrual_timeout_seconds: parsed(
                "ACCRUAL_TIMEOUT_SECONDS",
                defaults.accrual_timeout_seconds,
            ),
            cors_origins: var("CORS_ORIGINS").map_or(defaults.cors_origins, |origins| {
                origins.split(',').map(|s| s.trim().to_string()).collect()
            }),
            max_body_bytes: parse_or(var("MAX_BODY_BYTES"), defaults.max_body_bytes),
            request_timeout_seconds: parsed(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_uri: None,
            accrual_address: None,
            auth_secret: random_secret(),
            session_ttl_seconds: 86_400,
            accrual_timeout_seconds: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// A bare `:port` listens on every interface.
fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// A process-local secret built from two v4 UUIDs.
fn random_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
