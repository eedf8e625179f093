use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use skquery::log::LogMgr;
use skquery::{web_server, ApiMgr, Config, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    LogMgr::init(config.log_format);

    if config.init_schema {
        if let Some(dir) = config.db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data directory {}", dir.display()))?;
        }
    }

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path.display()))?;
    if config.init_schema {
        store.init_schema().context("initializing schema")?;
    }

    let api_mgr = Arc::new(ApiMgr::new(Arc::new(store)));
    web_server::start_server(api_mgr, config.port)
        .await
        .context("query service stopped")?;
    Ok(())
}
