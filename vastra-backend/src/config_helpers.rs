use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use vastra_blobs::{BlobStore, FsBlobStore, MemoryBlobStore};
use vastra_config::{Config, EngineKind, StorageBackend};
use vastra_engines::{CompositeEngine, RemoteEngine};
use vastra_job_queue::{InferenceEngine, ManagerOptions};

/// Build the blob store selected by `storage.backend`.
pub fn blob_store_from_config(cfg: &Config) -> anyhow::Result<Arc<dyn BlobStore>> {
    match cfg.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryBlobStore::new())),
        StorageBackend::Filesystem => {
            std::fs::create_dir_all(&cfg.storage.directory).with_context(|| {
                format!("creating blob directory {}", cfg.storage.directory)
            })?;
            Ok(Arc::new(FsBlobStore::new(&cfg.storage.directory)))
        }
    }
}

/// Build the inference engine selected by `engine.kind`.
pub fn engine_from_config(cfg: &Config) -> anyhow::Result<Arc<dyn InferenceEngine>> {
    match cfg.engine.kind {
        EngineKind::Composite => Ok(Arc::new(
            CompositeEngine::new()
                .with_latency(Duration::from_millis(cfg.engine.simulated_latency_ms)),
        )),
        EngineKind::Remote => {
            let url = cfg
                .engine
                .remote_url
                .as_deref()
                .context("engine.remote_url is required for the remote engine")?;
            let engine = RemoteEngine::new(url, Duration::from_secs(cfg.engine.timeout_secs))?
                .with_max_artifact_bytes(cfg.engine.max_artifact_bytes);
            Ok(Arc::new(engine))
        }
    }
}

/// Job manager tunables from the `jobs`, `uploads` and `engine` sections.
pub fn manager_options_from_config(cfg: &Config) -> ManagerOptions {
    ManagerOptions {
        max_jobs: cfg.jobs.max_jobs,
        workers: cfg.jobs.workers,
        max_image_bytes: cfg.uploads.max_image_bytes,
        engine_timeout: Some(Duration::from_secs(cfg.engine.timeout_secs)),
    }
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| host.parse::<Ipv6Addr>().map(|ip| SocketAddr::new(IpAddr::V6(ip), port)))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_fallbacks() {
        assert_eq!(
            parse_bind_address("127.0.0.1", 5080),
            SocketAddr::from(([127, 0, 0, 1], 5080))
        );
        assert_eq!(parse_bind_address("::1", 80).port(), 80);
        assert_eq!(
            parse_bind_address("example.internal", 5080),
            SocketAddr::from(([0, 0, 0, 0], 5080))
        );
    }

    #[test]
    fn builds_default_services() {
        let cfg = Config::default();
        assert_eq!(blob_store_from_config(&cfg).unwrap().kind(), "memory");
        assert_eq!(engine_from_config(&cfg).unwrap().name(), "composite");

        let options = manager_options_from_config(&cfg);
        assert_eq!(options.workers, 4);
        assert_eq!(options.engine_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn builds_filesystem_store_and_remote_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.storage.backend = StorageBackend::Filesystem;
        cfg.storage.directory = dir.path().join("blobs").to_string_lossy().into_owned();
        cfg.engine.kind = EngineKind::Remote;
        cfg.engine.remote_url = Some("http://localhost:5001".into());

        assert_eq!(blob_store_from_config(&cfg).unwrap().kind(), "filesystem");
        assert!(dir.path().join("blobs").is_dir());
        assert_eq!(engine_from_config(&cfg).unwrap().name(), "remote");
    }

    #[test]
    fn remote_engine_without_url_fails() {
        let mut cfg = Config::default();
        cfg.engine.kind = EngineKind::Remote;
        assert!(engine_from_config(&cfg).is_err());
    }
}
