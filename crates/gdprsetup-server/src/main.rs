//! gdprsetup — consent evaluation and CSP server for a content-managed site.

use std::path::PathBuf;
use std::sync::Arc;

use gdprsetup_consent::PolicyVersion;
use gdprsetup_core::{ServerConfig, SiteConfig};
use gdprsetup_server::{build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("GDPRSETUP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_fingerprint(data_dir: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::from_env(&data_dir)?;
    let site = SiteConfig::load(&config.data_paths.site_config_file);
    let version = PolicyVersion::of(&site.privacy_info);
    println!("Site config:  {}", config.data_paths.site_config_file.display());
    println!("Fingerprint:  {}", version.fingerprint);
    println!("Cookie name:  {}", version.cookie_name());
    println!("Categories:   {}", site.categories().len());
    Ok(())
}

fn init_site_config(data_dir: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig::from_env(&data_dir)?;
    let path = &config.data_paths.site_config_file;
    if SiteConfig::init(path)? {
        println!("Wrote default site config to {}", path.display());
    } else {
        println!("Site config already exists at {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "--fingerprint" | "fingerprint" => {
                let data_dir = if args.len() > 2 {
                    PathBuf::from(&args[2])
                } else {
                    resolve_data_dir()
                };
                return print_fingerprint(data_dir);
            }
            "init" => {
                let data_dir = if args.len() > 2 {
                    PathBuf::from(&args[2])
                } else {
                    resolve_data_dir()
                };
                return init_site_config(data_dir);
            }
            "--help" | "-h" | "help" => {
                println!("gdprsetup — consent evaluation and CSP server");
                println!();
                println!("Usage: gdprsetup [command]");
                println!();
                println!("Commands:");
                println!("  (none)                   Start the server");
                println!("  fingerprint [data-dir]   Print the current policy fingerprint");
                println!("  init [data-dir]          Write a default site.json if none exists");
                println!("  help                     Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'gdprsetup help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = ServerConfig::from_env(&data_dir)?;
    let port = config.port;

    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("gdprsetup server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
