use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use colonnade::{AppState, authz, build_app, config::AdminConfig, db::DbPool, observability};
use tokio_util::task::TaskTracker;

#[derive(Parser, Debug)]
#[command(version, about = "Colonnade access administration", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "colonnade.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the server (default)
    Serve,
    /// Run database migrations and exit
    ///
    /// Useful for init containers or CI/CD pipelines.
    Migrate,
    /// Print the functional permission catalogue and exit
    Permissions,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&args.config).await,
        Command::Migrate => run_migrate(&args.config).await,
        Command::Permissions => print_permissions(),
    }
}

fn load_config(path: &str) -> AdminConfig {
    match AdminConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &AdminConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }
}

async fn open_database(config: &AdminConfig) -> Arc<DbPool> {
    match DbPool::from_config(&config.database).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, "Failed to open database");
            std::process::exit(1);
        }
    }
}

async fn run_migrate(config_path: &str) {
    let config = load_config(config_path);
    init_tracing(&config);

    let db = open_database(&config).await;
    if let Err(e) = db.run_migrations().await {
        tracing::error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }
    tracing::info!("Migrations complete");
}

fn print_permissions() {
    println!("# permission catalogue v{}", authz::CATALOG_VERSION);
    for (name, category, description) in authz::PERMISSION_CATALOG {
        println!("{:<24} {:<14} {}", name, category, description);
    }
}

async fn run_server(config_path: &str) {
    let config = Arc::new(load_config(config_path));
    init_tracing(&config);

    let db = open_database(&config).await;
    if config.database.run_migrations()
        && let Err(e) = db.run_migrations().await
    {
        tracing::error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }

    let task_tracker = TaskTracker::new();
    let state = match AppState::new(config.clone(), db, task_tracker.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Invalid token configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = state.services.roles.sync_catalog().await {
        tracing::error!(error = %e, "Failed to synchronize the permission catalogue");
        std::process::exit(1);
    }

    if let Some(bootstrap) = &config.auth.bootstrap {
        match state.services.users.bootstrap_admin(bootstrap).await {
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to create bootstrap admin");
                std::process::exit(1);
            }
        }
    }

    let app = build_app(state);

    let bind_addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_addr, "Failed to bind to address");
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on http://{}", bind_addr);

    // Graceful shutdown: wait for SIGINT/SIGTERM, then drain background audit writes
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(task_tracker))
    .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal(task_tracker: TaskTracker) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, waiting for background tasks to complete...");

    task_tracker.close();

    match tokio::time::timeout(Duration::from_secs(30), task_tracker.wait()).await {
        Ok(()) => tracing::info!("All background tasks completed"),
        Err(_) => {
            tracing::warn!("Timeout waiting for background tasks, some may not have completed")
        }
    }

    tracing::info!("Shutdown complete");
}
