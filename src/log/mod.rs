// src/log/mod.rs

// Logging module (LogMgr): installs the global tracing subscriber.

use std::sync::Once;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

static INIT: Once = Once::new();

pub struct LogMgr;

impl LogMgr {
    /// Initializes logging once per process. Filter comes from `RUST_LOG`,
    /// defaulting to `info`.
    pub fn init(format: LogFormat) {
        INIT.call_once(|| {
            let env_filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

            match format {
                LogFormat::Json => {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().json())
                        .init();
                }
                LogFormat::Pretty => {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }
        });
    }
}
