mod cli;
mod error;
mod handlers;
mod services;
mod session;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::routing::{delete, get, post};
use clap::{Parser, Subcommand};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkstrip_db::db::init_db;

use services::cache::{Cache, MemoryCache, RedisCache};
use services::key_service::KeyService;
use services::resolver_service::{ResolverConfig, ResolverService};
use services::settings_service::SettingsService;
use services::stats_service::StatsService;
use services::user_service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub cache: Arc<dyn Cache>,
    pub key_service: Arc<KeyService>,
    pub user_service: Arc<UserService>,
    pub settings_service: Arc<SettingsService>,
    pub stats_service: Arc<StatsService>,
    pub resolver: Arc<ResolverService>,
    pub jwt_secret: String,
}

#[derive(Parser)]
#[command(name = "linkstrip")]
#[command(about = "Video share-link parsing service with metered API keys", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve,
    /// Administrative tools
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Reset an account's password
    ResetPassword {
        /// Email of the account
        email: String,
        /// New password
        new_pass: String,
    },
    /// Grant the admin role to an account
    Promote {
        /// Email of the account
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("Warning: failed to load .env file: {}", e);
    }

    let cli = Cli::parse();

    let file_appender = tracing_appender::rolling::never(".", "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "linkstrip_panel=debug,linkstrip_db=debug,axum=info,tower_http=info,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    let pool = init_db().await?;
    info!("Database initialized");

    match cli.command {
        Commands::Serve => run_server(pool).await?,
        Commands::Admin { subcommand } => match subcommand {
            AdminCommands::ResetPassword { email, new_pass } => {
                cli::reset_password(&pool, &email, &new_pass).await?;
            }
            AdminCommands::Promote { email } => {
                cli::promote(&pool, &email).await?;
            }
        },
    }

    Ok(())
}

async fn run_server(pool: sqlx::PgPool) -> Result<()> {
    // No REDIS_URL means a single-process deployment: listings are cached
    // in-process instead. A configured-but-unreachable Redis is fatal.
    let cache: Arc<dyn Cache> = match std::env::var("REDIS_URL") {
        Ok(redis_url) => match RedisCache::connect(&redis_url).await {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::error!("Redis connection failed: {e:#}. Ensure Redis is running.");
                return Err(e);
            }
        },
        Err(_) => {
            warn!("REDIS_URL is not set, using the in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET is not set, using an insecure default");
        "change-me".to_string()
    });
    let super_admin_email = std::env::var("SUPER_ADMIN_EMAIL").unwrap_or_default();
    if super_admin_email.is_empty() {
        warn!("SUPER_ADMIN_EMAIL is not set; role changes via the API are disabled");
    }
    let trial_quota: i32 = std::env::var("TRIAL_QUOTA")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    let key_service = Arc::new(KeyService::new(pool.clone(), cache.clone()));
    let user_service = Arc::new(UserService::new(
        pool.clone(),
        cache.clone(),
        key_service.clone(),
        super_admin_email,
        trial_quota,
    ));
    let settings_service = Arc::new(SettingsService::new(pool.clone(), cache.clone()));
    let stats_service = Arc::new(StatsService::new(pool.clone(), cache.clone()));
    let resolver = Arc::new(ResolverService::new(ResolverConfig::from_env()));

    let state = AppState {
        pool: pool.clone(),
        cache,
        key_service,
        user_service,
        settings_service,
        stats_service,
        resolver,
        jwt_secret,
    };

    let admin_routes = Router::new()
        .route(
            "/keys",
            get(handlers::admin::api_keys::list_keys).post(handlers::admin::api_keys::create_key),
        )
        .route("/keys/{id}/renew", post(handlers::admin::api_keys::renew_key))
        .route("/keys/{id}/quota", post(handlers::admin::api_keys::add_quota))
        .route("/keys/{id}", delete(handlers::admin::api_keys::delete_key))
        .route("/users", get(handlers::admin::users::list_users))
        .route("/users/{id}", delete(handlers::admin::users::delete_user))
        .route("/users/promote", post(handlers::admin::users::promote))
        .route("/users/demote", post(handlers::admin::users::demote))
        .route("/stats", get(handlers::admin::stats::get_stats))
        .route("/usage-logs", get(handlers::admin::usage_logs::list_usage_logs))
        .route(
            "/settings",
            get(handlers::admin::settings::get_settings)
                .put(handlers::admin::settings::update_settings),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::admin::admin_guard,
        ));

    let app = Router::new()
        .route("/api/parse", post(handlers::parse::parse))
        .route("/api/keys/verify", post(handlers::keys::verify))
        .route("/api/usage/consume", post(handlers::keys::consume))
        .route("/api/settings", get(handlers::settings::get_settings))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
