use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{DEFAULT_DIFFICULTY, DIFF_MAX};
use crate::error::ConfigError;
use crate::miner::DEFAULT_MAX_ATTEMPTS;

/// Node settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Address advertised to peers; defaults to `http://{host}:{port}`.
    pub public_address: Option<String>,
    pub data_dir: PathBuf,
    pub difficulty: u32,
    pub miner_threads: usize,
    pub max_nonce: u64,
    /// Bootstrap peers connected at start-up.
    pub peers: Vec<String>,
    pub search_ttl: u32,
    pub search_cache_size: usize,
    pub peer_timeout: Duration,
    /// Create a genesis block when no chain is stored.
    pub genesis: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_address: None,
            data_dir: PathBuf::from("data_blocks"),
            difficulty: DEFAULT_DIFFICULTY,
            miner_threads: num_cpus::get(),
            max_nonce: DEFAULT_MAX_ATTEMPTS,
            peers: Vec::new(),
            search_ttl: 3,
            search_cache_size: 1024,
            peer_timeout: Duration::from_millis(5000),
            genesis: true,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let difficulty = parse(&lookup, "DIFFICULTY", d.difficulty)?;
        if difficulty > DIFF_MAX {
            return Err(ConfigError::Invalid {
                key: "DIFFICULTY",
                value: difficulty.to_string(),
            });
        }
        let miner_threads = parse(&lookup, "MINER_THREADS", d.miner_threads)?;
        if miner_threads == 0 {
            return Err(ConfigError::Invalid {
                key: "MINER_THREADS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(d.host),
            port: parse(&lookup, "PORT", d.port)?,
            public_address: lookup("PUBLIC_ADDRESS").filter(|s| !s.trim().is_empty()),
            data_dir: lookup("DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            difficulty,
            miner_threads,
            max_nonce: parse(&lookup, "MAX_NONCE", d.max_nonce)?,
            peers: lookup("PEERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            search_ttl: parse(&lookup, "SEARCH_TTL", d.search_ttl)?,
            search_cache_size: parse(&lookup, "SEARCH_CACHE_SIZE", d.search_cache_size)?,
            peer_timeout: Duration::from_millis(parse(
                &lookup,
                "PEER_TIMEOUT_MS",
                d.peer_timeout.as_millis() as u64,
            )?),
            genesis: parse(&lookup, "GENESIS", d.genesis)?,
        })
    }

    pub fn address(&self) -> String {
        self.public_address
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
