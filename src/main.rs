use std::{process, sync::Arc};

use chirp::{
    application::{
        api::ApiClient,
        auth::IdentityService,
        error::AppError,
        procedures::{AppRouter, PostProcedureConfig},
        query_cache::QueryClient,
        rate_limit::PostRateLimiter,
        repos::{HealthRepo, PostsRepo, PostsWriteRepo, SessionsRepo, UsersRepo},
        ssg::generate_ssg_helper,
    },
    config,
    domain::posts::ContentRules,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Users(args) => match args.command {
            config::UsersCommand::Create(create) => run_create_user(settings, create).await,
        },
        config::Command::Sessions(args) => match args.command {
            config::SessionsCommand::Issue(issue) => run_issue_session(settings, issue).await,
            config::SessionsCommand::Revoke(revoke) => run_revoke_session(settings, revoke).await,
        },
        config::Command::Prerender(args) => run_prerender(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings);
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "chirp::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(InfraError::from)?;

    info!(target = "chirp::serve", "server stopped");
    Ok(())
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let identity = build_identity(&repositories, &settings);

    let user = identity
        .create_user(&args.username, &args.profile_image_url)
        .await?;
    info!(
        target = "chirp::users",
        user_id = %user.id,
        username = %user.username,
        "user created"
    );
    println!("{}", user.id);
    Ok(())
}

async fn run_issue_session(
    settings: config::Settings,
    args: config::IssueSessionArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let identity = build_identity(&repositories, &settings);

    let issued = identity.issue_session(&args.username, args.ttl_hours).await?;
    info!(
        target = "chirp::sessions",
        session_id = %issued.session.id,
        username = %issued.user.username,
        expires_at = ?issued.session.expires_at,
        "session issued"
    );
    println!("{}", issued.token);
    Ok(())
}

async fn run_revoke_session(
    settings: config::Settings,
    args: config::RevokeSessionArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let identity = build_identity(&repositories, &settings);

    let session = identity.revoke(&args.token).await?;
    info!(
        target = "chirp::sessions",
        session_id = %session.id,
        revoked_at = ?session.revoked_at,
        "session revoked"
    );
    Ok(())
}

async fn run_prerender(
    settings: config::Settings,
    args: config::PrerenderArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let helper = generate_ssg_helper(build_app_router(&repositories, &settings));

    let html = http::prerender_home(&helper, &settings.site, &settings.auth.sign_in_url)
        .await
        .map_err(|err| InfraError::render(err.to_string()))?;

    tokio::fs::write(&args.file, html)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "chirp::prerender",
        path = %args.file.display(),
        "home page written"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| AppError::unexpected("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, &settings.database)
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_app_router(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> AppRouter {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();

    let limiter = PostRateLimiter::new(
        settings.posts.rate_limit_window,
        settings.posts.rate_limit_max_posts.get(),
    );
    let config = PostProcedureConfig {
        rules: ContentRules {
            max_chars: settings.posts.max_content_chars.get() as usize,
        },
        feed_limit: settings.posts.feed_limit.get(),
    };

    AppRouter::new(posts_repo, posts_write_repo, limiter, config)
}

fn build_identity(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> IdentityService {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();

    IdentityService::new(
        users_repo,
        sessions_repo,
        settings.auth.resolve_timeout,
        settings.auth.session_ttl_hours,
    )
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> HttpState {
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();
    let queries = Arc::new(QueryClient::new(settings.query_cache.stale_after));

    HttpState {
        api: ApiClient::new(build_app_router(&repositories, settings), queries),
        identity: build_identity(&repositories, settings),
        health: health_repo,
        site: Arc::new(settings.site.clone()),
        auth: Arc::new(settings.auth.clone()),
    }
}

/// Resolves on ctrl-c or SIGTERM, then arms a hard deadline for in-flight
/// requests.
async fn shutdown_signal(grace: std::time::Duration) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "chirp::serve", error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "chirp::serve", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(
        target = "chirp::serve",
        grace_secs = grace.as_secs(),
        "shutdown requested, draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(target = "chirp::serve", "graceful shutdown timed out");
        process::exit(1);
    });
}
