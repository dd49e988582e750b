use crate::domain::BlockRegistry;
use std::{
    env, fmt, fs, io,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("BASTION_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn server_url() -> String {
    env::var("BASTION_SERVER_URL").unwrap_or_else(|_| "ws://127.0.0.1:3001/ws".to_string())
}

pub fn connect_timeout() -> Duration {
    let millis = env::var("BASTION_CONNECT_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1500);
    Duration::from_millis(millis)
}

/// Fixed seed from the environment, or one derived from the clock.
pub fn world_seed() -> u64 {
    env::var("BASTION_SEED")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or_else(clock_seed)
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const SYNC_BROADCAST_CAPACITY: usize = 256;
pub const OBSERVER_INBOX_CAPACITY: usize = 1024;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
pub const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 60);
// Observer summary log cadence, in frames.
pub const SUMMARY_EVERY_FRAMES: u64 = 300;

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// The block property table: `BASTION_BLOCKS_FILE` when set, the built-in one otherwise.
pub fn load_block_registry() -> Result<BlockRegistry, ConfigError> {
    match env::var_os("BASTION_BLOCKS_FILE") {
        Some(path) => read_block_registry(PathBuf::from(path)),
        None => Ok(BlockRegistry::default()),
    }
}

pub fn read_block_registry(path: PathBuf) -> Result<BlockRegistry, ConfigError> {
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    parse_block_registry(&text).map_err(|source| ConfigError::Parse { path, source })
}

pub fn parse_block_registry(text: &str) -> Result<BlockRegistry, toml::de::Error> {
    toml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockKind, BlockTypeId, Collision};

    #[test]
    fn when_table_is_parsed_then_ids_follow_declaration_order() {
        let registry = parse_block_registry(
            r#"
            [[block]]
            name = "wall"
            collision = "solid"
            texture = "wall"

            [[block]]
            name = "belt"
            kind = "conveyor"
            collision = "sensor"
            material_required = "coal"
            texture = "belt"
            "#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("belt"), Some(BlockTypeId(1)));
        let belt = registry.get(BlockTypeId(1)).unwrap();
        assert_eq!(belt.kind, BlockKind::Conveyor);
        assert_eq!(belt.collision, Collision::Sensor);
        assert_eq!(belt.material_required.as_deref(), Some("coal"));
        assert!(belt.removable);
    }

    #[test]
    fn when_table_is_malformed_then_parse_fails() {
        assert!(parse_block_registry("[[block]]\nname = 3\n").is_err());
    }

    #[test]
    fn when_file_is_missing_then_read_error_names_the_path() {
        let err = read_block_registry(PathBuf::from("/nonexistent/blocks.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/blocks.toml"));
    }
}
