use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zotwise::config::{Cli, Config, default_config_path};
use zotwise::logger::TracingLogger;
use zotwise::readwise::ReadwiseClient;
use zotwise::run::run;
use zotwise::store::FileStore;
use zotwise::unpack_error;
use zotwise::zotero::ZoteroClient;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config_path = args
        .config_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let data_dir = cfg.data_dir(&config_path);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(error = %e, path = ?data_dir, "failed to create data directory");
        std::process::exit(1);
    }

    let mut zotero = ZoteroClient::new(
        &cfg.zotero.api_key,
        &cfg.zotero.library_id,
        cfg.library_type(&args),
    );
    if let Some(url) = &cfg.zotero.base_url {
        zotero = zotero.with_base_url(url);
    }

    let mut readwise = ReadwiseClient::new(&cfg.readwise.token).with_error_log_dir(&data_dir);
    if let Some(url) = &cfg.readwise.base_url {
        readwise = readwise.with_base_url(url);
    }

    let store = FileStore::new(&data_dir);
    let logger = TracingLogger::new("zotwise.sync");
    let options = cfg.run_options(&args);

    tracing::info!("zotwise starting");
    match run(&options, &zotero, &readwise, &store, &logger).await {
        Ok(summary) => {
            tracing::info!(
                converted = summary.stats.converted,
                failed = summary.stats.failed,
                uploaded = summary.uploaded,
                library_version = summary.library_version,
                "zotwise finished"
            );
        }
        Err(e) => {
            tracing::error!(error = %unpack_error(&*e), "zotwise run failed");
            std::process::exit(1);
        }
    }
}
