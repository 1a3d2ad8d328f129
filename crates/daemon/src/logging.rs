// SPDX-License-Identifier: MIT

//! `tracing-subscriber` initialization. Structured `tracing` spans/events
//! carry the daemon's four debug-log severities
//! (`ERROR`/`WARN`/`INFO`/`ALL` -> `error!`/`warn!`/`info!`/`trace!`).

use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}
