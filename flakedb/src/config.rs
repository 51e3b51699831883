//! Node configuration from the `fdb-*` key-value environment.
//!
//! This module aggregates configuration for:
//!
//! - the node mode and consensus flavor,
//! - the storage backend (file directory, S3 bucket, encryption secret),
//! - memory budgets (index cache, novelty reindex thresholds),
//! - the consensus group (server list, this server, election timeout).
//!
//! Values arrive as strings; sizes parse with `b/k/kb/m/mb/g/gb` suffixes
//! (default bytes) and times with `ms/s/m/h/d/y` suffixes (default
//! milliseconds). Invalid configuration is fatal at startup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::LedgerError;

/// Which subsystems this node starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeMode {
    /// Everything in one process, suitable for development.
    #[default]
    Dev,
    /// Query peer only: serves reads, never transacts.
    Query,
    /// Transactor/ledger role.
    Ledger,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConsensusType {
    Raft,
    #[default]
    InMemory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    File,
    Memory,
    S3,
    Stash,
}

/// One `id@host:port` entry of `fdb-group-servers`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupServer {
    pub id: String,
    pub host: String,
    pub port: u16,
}

/// Aggregated node settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub mode: NodeMode,
    pub consensus_type: ConsensusType,
    pub storage_type: StorageType,
    pub storage_file_directory: PathBuf,
    pub storage_s3_bucket: Option<String>,
    /// Index cache budget in bytes.
    pub memory_cache_bytes: u64,
    /// Novelty soft threshold: the indexer is eligible to flush.
    pub novelty_min_bytes: u64,
    /// Novelty hard threshold: the transactor applies back-pressure.
    pub novelty_max_bytes: u64,
    pub group_servers: Vec<GroupServer>,
    pub this_server: Option<String>,
    pub group_timeout: Duration,
    pub encryption_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: NodeMode::Dev,
            consensus_type: ConsensusType::InMemory,
            storage_type: StorageType::File,
            storage_file_directory: PathBuf::from("data/ledger"),
            storage_s3_bucket: None,
            memory_cache_bytes: 200 * 1024 * 1024,
            novelty_min_bytes: 1024 * 1024,
            novelty_max_bytes: 2 * 1024 * 1024,
            group_servers: Vec::new(),
            this_server: None,
            group_timeout: Duration::from_millis(2000),
            encryption_secret: None,
        }
    }
}

fn invalid(msg: String) -> LedgerError {
    LedgerError::InvalidConfiguration(msg)
}

/// Parses a size string: `([0-9.]+)(b|k|kb|m|mb|g|gb)?`, default unit bytes.
pub fn parse_size(input: &str) -> Result<u64, LedgerError> {
    let (value, unit) = split_suffix(input)?;
    let multiplier: u64 = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        other => return Err(invalid(format!("unknown size unit {other:?} in {input:?}"))),
    };
    Ok((value * multiplier as f64) as u64)
}

/// Parses a time string: `([0-9.]+)(ms|s|m|h|d|y)?`, default unit
/// milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration, LedgerError> {
    let (value, unit) = split_suffix(input)?;
    let millis: f64 = match unit.to_ascii_lowercase().as_str() {
        "" | "ms" => value,
        "s" => value * 1000.0,
        "m" => value * 60.0 * 1000.0,
        "h" => value * 60.0 * 60.0 * 1000.0,
        "d" => value * 24.0 * 60.0 * 60.0 * 1000.0,
        "y" => value * 365.0 * 24.0 * 60.0 * 60.0 * 1000.0,
        other => return Err(invalid(format!("unknown time unit {other:?} in {input:?}"))),
    };
    Ok(Duration::from_millis(millis as u64))
}

fn split_suffix(input: &str) -> Result<(f64, &str), LedgerError> {
    let trimmed = input.trim();
    let digits_end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(digits_end);
    let value: f64 = digits
        .parse()
        .map_err(|_| invalid(format!("unparseable number in {input:?}")))?;
    Ok((value, unit))
}

fn parse_group_server(entry: &str) -> Result<GroupServer, LedgerError> {
    let (id, addr) = entry
        .split_once('@')
        .ok_or_else(|| invalid(format!("group server {entry:?} is not id@host:port")))?;
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid(format!("group server {entry:?} is missing a port")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| invalid(format!("group server {entry:?} has a bad port")))?;
    if id.is_empty() || host.is_empty() {
        return Err(invalid(format!("group server {entry:?} is incomplete")));
    }
    Ok(GroupServer {
        id: id.to_string(),
        host: host.to_string(),
        port,
    })
}

impl Settings {
    /// Builds settings from an explicit key-value map (tests, config files).
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, LedgerError> {
        let mut settings = Settings::default();
        let get = |key: &str| map.get(key).map(String::as_str);

        if let Some(mode) = get("fdb-mode") {
            settings.mode = match mode {
                "dev" => NodeMode::Dev,
                "query" => NodeMode::Query,
                "ledger" => NodeMode::Ledger,
                other => return Err(invalid(format!("unknown fdb-mode {other:?}"))),
            };
        }
        if let Some(consensus) = get("fdb-consensus-type") {
            settings.consensus_type = match consensus {
                "raft" => ConsensusType::Raft,
                "in-memory" => ConsensusType::InMemory,
                other => return Err(invalid(format!("unknown fdb-consensus-type {other:?}"))),
            };
        }
        if let Some(storage) = get("fdb-storage-type") {
            settings.storage_type = match storage {
                "file" => StorageType::File,
                "memory" => StorageType::Memory,
                "s3" => StorageType::S3,
                "stash" => StorageType::Stash,
                other => return Err(invalid(format!("unknown fdb-storage-type {other:?}"))),
            };
        }
        if let Some(dir) = get("fdb-storage-file-directory") {
            settings.storage_file_directory = PathBuf::from(dir);
        }
        if let Some(bucket) = get("fdb-storage-s3-bucket") {
            settings.storage_s3_bucket = Some(bucket.to_string());
        }
        if let Some(cache) = get("fdb-memory-cache") {
            settings.memory_cache_bytes = parse_size(cache)?;
        }
        if let Some(reindex) = get("fdb-memory-reindex") {
            settings.novelty_min_bytes = parse_size(reindex)?;
        }
        if let Some(reindex_max) = get("fdb-memory-reindex-max") {
            settings.novelty_max_bytes = parse_size(reindex_max)?;
        }
        if let Some(servers) = get("fdb-group-servers") {
            settings.group_servers = servers
                .split(',')
                .map(|s| parse_group_server(s.trim()))
                .collect::<Result<_, _>>()?;
        }
        if let Some(this_server) = get("fdb-group-this-server") {
            settings.this_server = Some(this_server.to_string());
        }
        if let Some(timeout) = get("fdb-group-timeout") {
            settings.group_timeout = parse_duration(timeout)?;
        }
        if let Some(secret) = get("fdb-encryption-secret") {
            settings.encryption_secret = Some(secret.to_string());
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Builds settings from process environment variables (`FDB_MODE`,
    /// `FDB_STORAGE_TYPE`, ... — the `fdb-*` keys upper-cased with
    /// underscores).
    pub fn from_env() -> Result<Self, LedgerError> {
        const KEYS: &[&str] = &[
            "fdb-mode",
            "fdb-consensus-type",
            "fdb-storage-type",
            "fdb-storage-file-directory",
            "fdb-storage-s3-bucket",
            "fdb-memory-cache",
            "fdb-memory-reindex",
            "fdb-memory-reindex-max",
            "fdb-group-servers",
            "fdb-group-this-server",
            "fdb-group-timeout",
            "fdb-encryption-secret",
        ];
        let mut map = HashMap::new();
        for key in KEYS {
            let env_key = key.to_ascii_uppercase().replace('-', "_");
            if let Ok(value) = std::env::var(&env_key) {
                map.insert(key.to_string(), value);
            }
        }
        Self::from_map(&map)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.novelty_max_bytes < self.novelty_min_bytes {
            return Err(invalid(format!(
                "fdb-memory-reindex-max ({}) is below fdb-memory-reindex ({})",
                self.novelty_max_bytes, self.novelty_min_bytes
            )));
        }
        if self.storage_type == StorageType::S3 && self.storage_s3_bucket.is_none() {
            return Err(invalid(
                "fdb-storage-type=s3 requires fdb-storage-s3-bucket".to_string(),
            ));
        }
        if let Some(this_server) = &self.this_server {
            if !self.group_servers.iter().any(|s| &s.id == this_server) {
                return Err(invalid(format!(
                    "fdb-group-this-server {this_server:?} does not appear in fdb-group-servers"
                )));
            }
        }
        if self.consensus_type == ConsensusType::Raft && self.group_servers.is_empty() {
            return Err(invalid(
                "fdb-consensus-type=raft requires fdb-group-servers".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn size_strings_parse_with_default_bytes() {
        assert_eq!(parse_size("100").unwrap(), 100);
        assert_eq!(parse_size("100b").unwrap(), 100);
        assert_eq!(parse_size("2k").unwrap(), 2048);
        assert_eq!(parse_size("2kb").unwrap(), 2048);
        assert_eq!(parse_size("1.5mb").unwrap(), 1_572_864);
        assert_eq!(parse_size("1g").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("10x").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn time_strings_parse_with_default_millis() {
        assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("5w").is_err());
    }

    #[test]
    fn settings_from_map_covers_the_recognized_keys() {
        let settings = Settings::from_map(&map(&[
            ("fdb-mode", "ledger"),
            ("fdb-consensus-type", "raft"),
            ("fdb-storage-type", "file"),
            ("fdb-storage-file-directory", "/var/lib/flakedb"),
            ("fdb-memory-cache", "100mb"),
            ("fdb-memory-reindex", "500kb"),
            ("fdb-memory-reindex-max", "1mb"),
            ("fdb-group-servers", "a@host1:9790,b@host2:9790"),
            ("fdb-group-this-server", "a"),
            ("fdb-group-timeout", "2s"),
            ("fdb-encryption-secret", "hunter2"),
        ]))
        .expect("settings should parse");

        assert_eq!(settings.mode, NodeMode::Ledger);
        assert_eq!(settings.consensus_type, ConsensusType::Raft);
        assert_eq!(settings.storage_type, StorageType::File);
        assert_eq!(
            settings.storage_file_directory,
            PathBuf::from("/var/lib/flakedb")
        );
        assert_eq!(settings.memory_cache_bytes, 100 * 1024 * 1024);
        assert_eq!(settings.novelty_min_bytes, 500 * 1024);
        assert_eq!(settings.novelty_max_bytes, 1024 * 1024);
        assert_eq!(settings.group_servers.len(), 2);
        assert_eq!(settings.group_servers[0].id, "a");
        assert_eq!(settings.group_servers[0].port, 9790);
        assert_eq!(settings.group_timeout, Duration::from_secs(2));
        assert_eq!(settings.encryption_secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        // Unknown mode.
        assert!(Settings::from_map(&map(&[("fdb-mode", "prod")])).is_err());
        // Max below min.
        assert!(
            Settings::from_map(&map(&[
                ("fdb-memory-reindex", "2mb"),
                ("fdb-memory-reindex-max", "1mb"),
            ]))
            .is_err()
        );
        // S3 without a bucket.
        assert!(Settings::from_map(&map(&[("fdb-storage-type", "s3")])).is_err());
        // this-server not in the group list.
        assert!(
            Settings::from_map(&map(&[
                ("fdb-group-servers", "a@h:1"),
                ("fdb-group-this-server", "z"),
            ]))
            .is_err()
        );
        // Raft without servers.
        assert!(Settings::from_map(&map(&[("fdb-consensus-type", "raft")])).is_err());
        // Malformed group entry.
        assert!(Settings::from_map(&map(&[("fdb-group-servers", "nohost")])).is_err());
    }

    #[test]
    fn errors_carry_the_invalid_configuration_kind() {
        let err = Settings::from_map(&map(&[("fdb-mode", "prod")])).unwrap_err();
        assert_eq!(err.kind(), "invalid-configuration");
    }
}
