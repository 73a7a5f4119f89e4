use std::{net::SocketAddr, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use office_transfer_api as api;
use api::auth::{Role, TokenSubject};

#[derive(Parser)]
#[command(
    name = "office-transfer-api",
    about = "Inter-office item transfer service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Mint a signed access token, e.g. for local testing
    IssueToken(IssueTokenArgs),
}

#[derive(Args)]
struct IssueTokenArgs {
    #[arg(long, help = "Numeric user identifier")]
    user_id: i32,
    #[arg(long, help = "GUEST, USER, ADMIN or SUPER_ADMIN")]
    role: String,
    #[arg(long, help = "Office the user belongs to")]
    office_id: Option<i32>,
    #[arg(long, help = "Display name")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg).await,
        Commands::Migrate => migrate(&cfg).await,
        Commands::IssueToken(args) => issue_token(&cfg, args),
    }
}

async fn serve(cfg: api::config::AppConfig) -> Result<()> {
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity.max(1));
    tokio::spawn(api::events::process_events(event_rx));

    let app_state = api::AppState::new(
        Arc::new(db_pool),
        cfg.clone(),
        api::events::EventSender::new(event_tx),
    );
    let app = api::app_router(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("office-transfer-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("office-transfer-api stopped");
    Ok(())
}

async fn migrate(cfg: &api::config::AppConfig) -> Result<()> {
    let db_pool = api::db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to the database")?;
    api::db::run_migrations(&db_pool)
        .await
        .context("failed running migrations")?;
    info!("migrations applied");
    Ok(())
}

fn issue_token(cfg: &api::config::AppConfig, args: IssueTokenArgs) -> Result<()> {
    let role = Role::from_str(args.role.trim()).map_err(|_| anyhow!("unknown role {}", args.role))?;
    let auth = api::auth::AuthService::new(
        api::auth::AuthConfig::from(cfg),
        Arc::new(api::auth::AccessPolicy::default()),
    );
    let token = auth
        .issue_token(&TokenSubject {
            user_id: args.user_id,
            name: args.name,
            email: None,
            role,
            office_id: args.office_id,
            permissions: Vec::new(),
        })
        .context("failed to sign token")?;
    println!("{}", token);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
    info!("shutdown signal received");
}
