use crate::tracing_setup::ReloadHandle;

/// Re-read the config file on SIGHUP and apply a changed log level.
///
/// Only `logging.level` is hot-reloaded; everything else needs a restart.
#[cfg(unix)]
pub fn spawn_log_level_reloader(
    config_path: Option<String>,
    initial_level: String,
    reload_handle: ReloadHandle,
) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(%e, "could not install SIGHUP handler; log level reload disabled");
                return;
            }
        };
        let mut current = initial_level;

        while hangup.recv().await.is_some() {
            let loaded = vastra_config::load_config(config_path.as_deref())
                .and_then(|cfg| vastra_config::validate_config(&cfg).map(|()| cfg));
            let new_cfg = match loaded {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!(%e, "failed to reload config file");
                    continue;
                }
            };

            if new_cfg.logging.level == current {
                tracing::info!("config reloaded; log level unchanged");
                continue;
            }
            let filter = tracing_subscriber::EnvFilter::new(&new_cfg.logging.level);
            match reload_handle(filter) {
                Ok(()) => {
                    tracing::info!(new_level = %new_cfg.logging.level, "log level updated at runtime");
                    current = new_cfg.logging.level;
                }
                Err(e) => tracing::error!(%e, "failed to reload log level"),
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_log_level_reloader(
    _config_path: Option<String>,
    _initial_level: String,
    _reload_handle: ReloadHandle,
) {
    tracing::debug!("log level reload on SIGHUP is unavailable on this platform");
}
