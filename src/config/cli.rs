use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the chirp binary.
#[derive(Debug, Parser)]
#[command(name = "chirp", version, about = "Emoji-only microblog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CHIRP_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Manage users.
    Users(UsersArgs),
    /// Manage sign-in sessions.
    Sessions(SessionsArgs),
    /// Write the signed-out home page to a file.
    Prerender(PrerenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override where the sign-in button points.
    #[arg(long = "auth-sign-in-url", value_name = "URL")]
    pub auth_sign_in_url: Option<String>,

    /// Override the post rate limit window.
    #[arg(long = "posts-rate-limit-window-seconds", value_name = "SECONDS")]
    pub posts_rate_limit_window_seconds: Option<u64>,

    /// Override how many posts one user may create per window.
    #[arg(long = "posts-rate-limit-max-posts", value_name = "COUNT")]
    pub posts_rate_limit_max_posts: Option<u64>,

    /// Override how long cached query results stay fresh.
    #[arg(long = "query-cache-stale-seconds", value_name = "SECONDS")]
    pub query_cache_stale_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum UsersCommand {
    /// Register a user.
    Create(CreateUserArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CreateUserArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, value_name = "NAME")]
    pub username: String,

    #[arg(long = "profile-image-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub profile_image_url: String,
}

#[derive(Debug, Args, Clone)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SessionsCommand {
    /// Issue a session token and print it.
    Issue(IssueSessionArgs),
    /// Revoke the session behind a token.
    Revoke(RevokeSessionArgs),
}

#[derive(Debug, Args, Clone)]
pub struct IssueSessionArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, value_name = "NAME")]
    pub username: String,

    /// Lifetime in hours; 0 never expires. Defaults to `auth.session_ttl_hours`.
    #[arg(long = "ttl-hours", value_name = "HOURS")]
    pub ttl_hours: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct RevokeSessionArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Token printed by `sessions issue`.
    #[arg(value_name = "TOKEN", env = "CHIRP_SESSION_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Debug, Args, Clone)]
pub struct PrerenderArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// HTML file to write.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}
