//! CLI argument parsing, validation, and startup helpers.

use axum::http::HeaderName;
use chrono::NaiveTime;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS,
};
use crate::rate_limit::{DEFAULT_REGISTER_PER_MINUTE, DEFAULT_SIGN_IN_PER_MINUTE};

pub const MIN_JWT_SECRET_LENGTH: usize = 32;

pub const DEFAULT_RETENTION_MONTHS: u32 = 12;

const PURGE_TIME_FORMAT: &str = "%H:%M";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Proxy header that carries the real client IP.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `X-Forwarded-For`, first entry is the client
    XForwardedFor,
    /// `X-Real-IP`
    XRealIp,
}

impl ClientIpHeader {
    pub fn header_name(&self) -> HeaderName {
        match self {
            ClientIpHeader::XForwardedFor => HeaderName::from_static("x-forwarded-for"),
            ClientIpHeader::XRealIp => HeaderName::from_static("x-real-ip"),
        }
    }

    /// Pull the client IP out of a header value.
    pub fn parse(&self, value: &str) -> Option<String> {
        let ip = match self {
            ClientIpHeader::XForwardedFor => value.split(',').next()?,
            ClientIpHeader::XRealIp => value,
        }
        .trim();

        ip.parse::<std::net::IpAddr>().ok().map(|ip| ip.to_string())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Postdesk", about = "Users and posts API with JWT authentication")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_URL", default_value = "postdesk.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECS)
    )]
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECS)
    )]
    pub refresh_token_ttl_secs: i64,

    /// Months a soft-deleted user is kept before being purged
    #[arg(long, default_value_t = DEFAULT_RETENTION_MONTHS)]
    pub retention_months: u32,

    /// Local time of day (HH:MM) when the purge job runs
    #[arg(long, default_value = "01:00", value_parser = parse_purge_time)]
    pub purge_at: NaiveTime,

    /// Sign-in attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_SIGN_IN_PER_MINUTE)]
    pub sign_in_per_minute: u32,

    /// Registrations allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_REGISTER_PER_MINUTE)]
    pub register_per_minute: u32,

    /// Read the client IP from this header (only behind a trusted proxy)
    #[arg(long)]
    pub ip_header: Option<ClientIpHeader>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_purge_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, PURGE_TIME_FORMAT)
        .map_err(|e| format!("Purge time must be HH:MM ({}): {}", e, s))
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // SAFETY: startup code; nothing else reads the environment concurrently.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl_secs: args.access_token_ttl_secs,
        refresh_token_ttl_secs: args.refresh_token_ttl_secs,
        retention_months: args.retention_months,
        purge_at: args.purge_at,
        sign_in_per_minute: args.sign_in_per_minute,
        register_per_minute: args.register_per_minute,
        ip_header: args.ip_header,
    }
}
