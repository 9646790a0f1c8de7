//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

pub use cli::*;

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::{procedures, query_cache};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "chirp";
const ENV_PREFIX: &str = "CHIRP";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_ACQUIRE_TIMEOUT_MS: u64 = 3000;
const DEFAULT_SITE_TITLE: &str = "Chirp";
const DEFAULT_SITE_DESCRIPTION: &str = "Say it with emoji.";
const DEFAULT_DATASTAR_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/gh/starfederation/datastar@1.0.0-RC.6/bundles/datastar.js";
const DEFAULT_SESSION_COOKIE: &str = "chirp_session";
const DEFAULT_SIGN_IN_URL: &str = "/sign-in";
const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 1500;
const DEFAULT_SESSION_TTL_HOURS: u32 = 24 * 30;
const DEFAULT_MAX_CONTENT_CHARS: u64 = 280;
const DEFAULT_FEED_LIMIT: u64 = procedures::DEFAULT_FEED_LIMIT as u64;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_POSTS: u64 = 3;
const DEFAULT_QUERY_STALE_SECS: u64 = query_cache::DEFAULT_STALE_AFTER.as_secs();

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
    pub auth: AuthSettings,
    pub posts: PostsSettings,
    pub query_cache: QueryCacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub description: String,
    pub datastar_script_url: String,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_cookie: String,
    pub sign_in_url: String,
    pub resolve_timeout: Duration,
    pub session_ttl_hours: u32,
}

#[derive(Debug, Clone)]
pub struct PostsSettings {
    pub max_content_chars: NonZeroU32,
    pub feed_limit: NonZeroU32,
    pub rate_limit_window: Duration,
    pub rate_limit_max_posts: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct QueryCacheSettings {
    pub stale_after: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Users(args)) => match &args.command {
            UsersCommand::Create(create) => raw.apply_database_override(&create.database),
        },
        Some(Command::Sessions(args)) => match &args.command {
            SessionsCommand::Issue(issue) => raw.apply_database_override(&issue.database),
            SessionsCommand::Revoke(revoke) => raw.apply_database_override(&revoke.database),
        },
        Some(Command::Prerender(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
    auth: RawAuthSettings,
    posts: RawPostsSettings,
    query_cache: RawQueryCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.auth_sign_in_url.as_ref() {
            self.auth.sign_in_url = Some(url.clone());
        }
        if let Some(window) = overrides.posts_rate_limit_window_seconds {
            self.posts.rate_limit_window_seconds = Some(window);
        }
        if let Some(max) = overrides.posts_rate_limit_max_posts {
            self.posts.rate_limit_max_posts = Some(max);
        }
        if let Some(stale) = overrides.query_cache_stale_seconds {
            self.query_cache.stale_seconds = Some(stale);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
            auth,
            posts,
            query_cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            site: build_site_settings(site)?,
            auth: build_auth_settings(auth)?,
            posts: build_posts_settings(posts)?,
            query_cache: build_query_cache_settings(query_cache),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    let acquire_timeout_ms = database
        .acquire_timeout_ms
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_MS);
    if acquire_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "database.acquire_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout: Duration::from_millis(acquire_timeout_ms),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let title = non_blank(site.title, DEFAULT_SITE_TITLE);
    let description = site
        .description
        .unwrap_or_else(|| DEFAULT_SITE_DESCRIPTION.to_string());
    let datastar_script_url = non_blank(site.datastar_script_url, DEFAULT_DATASTAR_SCRIPT_URL);
    if !datastar_script_url.starts_with("https://")
        && !datastar_script_url.starts_with("http://")
        && !datastar_script_url.starts_with('/')
    {
        return Err(LoadError::invalid(
            "site.datastar_script_url",
            "must be an absolute http(s) URL or a root-relative path",
        ));
    }

    Ok(SiteSettings {
        title,
        description,
        datastar_script_url,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let session_cookie = non_blank(auth.session_cookie, DEFAULT_SESSION_COOKIE);
    if !session_cookie
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(LoadError::invalid(
            "auth.session_cookie",
            "cookie name may only contain letters, digits, `_` and `-`",
        ));
    }

    let resolve_timeout_ms = auth.resolve_timeout_ms.unwrap_or(DEFAULT_RESOLVE_TIMEOUT_MS);
    if resolve_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "auth.resolve_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(AuthSettings {
        session_cookie,
        sign_in_url: non_blank(auth.sign_in_url, DEFAULT_SIGN_IN_URL),
        resolve_timeout: Duration::from_millis(resolve_timeout_ms),
        session_ttl_hours: auth.session_ttl_hours.unwrap_or(DEFAULT_SESSION_TTL_HOURS),
    })
}

fn build_posts_settings(posts: RawPostsSettings) -> Result<PostsSettings, LoadError> {
    let max_content_chars = non_zero_u32(
        posts.max_content_chars.unwrap_or(DEFAULT_MAX_CONTENT_CHARS),
        "posts.max_content_chars",
    )?;
    let feed_limit = non_zero_u32(
        posts.feed_limit.unwrap_or(DEFAULT_FEED_LIMIT),
        "posts.feed_limit",
    )?;
    let window_secs = posts
        .rate_limit_window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    if window_secs == 0 {
        return Err(LoadError::invalid(
            "posts.rate_limit_window_seconds",
            "must be greater than zero",
        ));
    }
    let rate_limit_max_posts = non_zero_u32(
        posts
            .rate_limit_max_posts
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_POSTS),
        "posts.rate_limit_max_posts",
    )?;

    Ok(PostsSettings {
        max_content_chars,
        feed_limit,
        rate_limit_window: Duration::from_secs(window_secs),
        rate_limit_max_posts,
    })
}

fn build_query_cache_settings(query_cache: RawQueryCacheSettings) -> QueryCacheSettings {
    QueryCacheSettings {
        stale_after: Duration::from_secs(
            query_cache
                .stale_seconds
                .unwrap_or(DEFAULT_QUERY_STALE_SECS),
        ),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    description: Option<String>,
    datastar_script_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    session_cookie: Option<String>,
    sign_in_url: Option<String>,
    resolve_timeout_ms: Option<u64>,
    session_ttl_hours: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPostsSettings {
    max_content_chars: Option<u64>,
    feed_limit: Option<u64>,
    rate_limit_window_seconds: Option<u64>,
    rate_limit_max_posts: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQueryCacheSettings {
    stale_seconds: Option<u64>,
}

fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
