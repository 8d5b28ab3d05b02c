//! Node configuration (spec.md §6), loaded from TOML via the `config` crate.
//!
//! Grounded on `zhtp::config::load_configuration`'s "parse, then apply CLI
//! overrides, then validate" shape, narrowed from that file's 11-package
//! aggregation down to the one flat struct this system needs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_listen_port() -> u16 {
    4001
}
fn default_dht_port() -> u16 {
    4000
}
fn default_stun_servers() -> Vec<String> {
    vec![
        "stun:stun.l.google.com:19302".to_string(),
        "stun:stun1.l.google.com:19302".to_string(),
        "stun:stun2.l.google.com:19302".to_string(),
    ]
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./dna-data")
}
fn default_gsk_rotation_days() -> u32 {
    7
}
fn default_presence_refresh_seconds() -> u64 {
    120
}
fn default_parallel_retrieve_timeout_ms() -> u64 {
    30_000
}
fn default_max_frame_bytes() -> u32 {
    16 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnaConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_dht_port")]
    pub dht_port: u16,
    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Hex-encoded fingerprint of the local identity to run as. `None`
    /// until an identity has been generated and persisted.
    #[serde(default)]
    pub identity_fp: Option<String>,
    #[serde(default = "default_gsk_rotation_days")]
    pub gsk_rotation_days: u32,
    #[serde(default = "default_presence_refresh_seconds")]
    pub presence_refresh_seconds: u64,
    #[serde(default = "default_parallel_retrieve_timeout_ms")]
    pub parallel_retrieve_timeout_ms: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

impl Default for DnaConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            dht_port: default_dht_port(),
            stun_servers: default_stun_servers(),
            data_dir: default_data_dir(),
            identity_fp: None,
            gsk_rotation_days: default_gsk_rotation_days(),
            presence_refresh_seconds: default_presence_refresh_seconds(),
            parallel_retrieve_timeout_ms: default_parallel_retrieve_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Load `DnaConfig` from an optional TOML file, falling back to defaults for
/// anything the file doesn't set and for a missing file entirely.
pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<DnaConfig> {
    let mut builder = config::Config::builder().add_source(config::Config::try_from(&DnaConfig::default())?);
    if let Some(path) = path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }
    }
    let cfg = builder.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = DnaConfig::default();
        assert_eq!(cfg.listen_port, 4001);
        assert_eq!(cfg.dht_port, 4000);
        assert_eq!(cfg.gsk_rotation_days, 7);
        assert_eq!(cfg.presence_refresh_seconds, 120);
        assert_eq!(cfg.parallel_retrieve_timeout_ms, 30_000);
        assert_eq!(cfg.max_frame_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.stun_servers.len(), 3);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load(Some(std::path::Path::new("/nonexistent/dna.toml"))).unwrap();
        assert_eq!(cfg.listen_port, DnaConfig::default().listen_port);
    }

    #[test]
    fn file_overrides_only_the_fields_it_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dna.toml");
        std::fs::write(&path, "listen_port = 5000\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.listen_port, 5000);
        assert_eq!(cfg.dht_port, DnaConfig::default().dht_port);
    }
}
