//! Configuration file parsing for `ringvm.toml`.
//!
//! Searches the current directory then its ancestors. No file means default
//! settings; a file that exists but does not parse is an error.

use ringvm_core::MachineConfig;
use ringvm_runtime::ChannelPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FILE_NAME: &str = "ringvm.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{}': {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting in '{}': {}", .path.display(), .message)]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct RingvmConfig {
    #[serde(default)]
    pub machine: MachineConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    #[default]
    Unbounded,
    FailFast,
    Backpressure,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    /// Value injected into the first machine after the phase settings.
    pub seed: i64,
    pub channel: ChannelKind,
    /// Buffer size for `fail-fast` and `backpressure` channels.
    pub capacity: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            seed: 0,
            channel: ChannelKind::Unbounded,
            capacity: 16,
        }
    }
}

impl PipelineSection {
    pub fn policy(&self) -> ChannelPolicy {
        match self.channel {
            ChannelKind::Unbounded => ChannelPolicy::Unbounded,
            ChannelKind::FailFast => ChannelPolicy::fail_fast(self.capacity),
            ChannelKind::Backpressure => ChannelPolicy::backpressure(self.capacity),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct LogSection {
    /// `tracing` filter directive, e.g. `"info"` or `"ringvm_runtime=debug"`.
    pub filter: Option<String>,
}

impl RingvmConfig {
    /// Load the explicit `path` if given, otherwise search from the current
    /// directory. Returns the path that was read, if any.
    pub fn resolve(path: Option<&Path>) -> Result<(Option<PathBuf>, Self), ConfigError> {
        if let Some(path) = path {
            return Ok((Some(path.to_path_buf()), Self::load_from(path)?));
        }
        let Ok(cwd) = std::env::current_dir() else {
            return Ok((None, Self::default()));
        };
        match Self::find_from(&cwd)? {
            Some((path, cfg)) => Ok((Some(path), cfg)),
            None => Ok((None, Self::default())),
        }
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Walk from `start` up to the filesystem root looking for `ringvm.toml`.
    pub fn find_from(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(FILE_NAME);
            if candidate.is_file() {
                let cfg = Self::load_from(&candidate)?;
                return Ok(Some((candidate, cfg)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let minimum = match self.pipeline.channel {
            ChannelKind::Unbounded => 0,
            // The first channel holds a phase setting and the seed.
            ChannelKind::FailFast => 2,
            ChannelKind::Backpressure => 1,
        };
        if self.pipeline.capacity < minimum {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: format!(
                    "pipeline.capacity must be at least {} for {:?} channels",
                    minimum, self.pipeline.channel
                ),
            });
        }
        if self.machine.max_memory == Some(0) {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "machine.max_memory must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Generate a default `ringvm.toml` template.
    pub fn default_template() -> &'static str {
        r#"# ringvm configuration

[machine]
# Fault once a machine has executed this many instructions.
# max_steps = 10000000
# Fault once a machine's memory would grow past this many cells.
# max_memory = 16777216

[pipeline]
seed = 0
# "unbounded", "fail-fast" or "backpressure"
channel = "unbounded"
# At least 2 for "fail-fast", at least 1 for "backpressure".
capacity = 16

[log]
# Overridden by RUST_LOG.
# filter = "info"
"#
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ringvm_runtime::OnFull;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ringvm-config-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn empty_string_returns_default() {
        let cfg: RingvmConfig = toml::from_str("").expect("empty toml is valid");
        assert_eq!(cfg, RingvmConfig::default());
        assert_eq!(cfg.pipeline.capacity, 16);
        assert_eq!(cfg.pipeline.policy(), ChannelPolicy::Unbounded);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[machine]
max_steps = 500
max_memory = 4096

[pipeline]
seed = 3
channel = "backpressure"
capacity = 2

[log]
filter = "debug"
"#;
        let cfg: RingvmConfig = toml::from_str(toml_str).expect("should parse");
        assert_eq!(cfg.machine.max_steps, Some(500));
        assert_eq!(cfg.machine.max_memory, Some(4096));
        assert_eq!(cfg.pipeline.seed, 3);
        assert_eq!(
            cfg.pipeline.policy(),
            ChannelPolicy::Bounded {
                capacity: 2,
                on_full: OnFull::Block
            }
        );
        assert_eq!(cfg.log.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn fail_fast_channel_kind() {
        let cfg: RingvmConfig =
            toml::from_str("[pipeline]\nchannel = \"fail-fast\"").expect("should parse");
        assert_eq!(cfg.pipeline.policy(), ChannelPolicy::fail_fast(16));
    }

    #[test]
    fn unknown_channel_kind_is_an_error() {
        let result: Result<RingvmConfig, _> = toml::from_str("[pipeline]\nchannel = \"lossy\"");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result: Result<RingvmConfig, _> = toml::from_str("[broken");
        assert!(result.is_err());
    }

    #[test]
    fn default_template_parses() {
        let cfg: RingvmConfig =
            toml::from_str(RingvmConfig::default_template()).expect("template must be valid toml");
        assert_eq!(cfg, RingvmConfig::default());
    }

    #[test]
    fn load_from_names_the_file_on_error() {
        let dir = scratch_dir("bad");
        let path = dir.join(FILE_NAME);
        std::fs::write(&path, "[pipeline\n").unwrap();
        let err = RingvmConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(FILE_NAME));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_capacity_is_rejected_for_bounded_channels() {
        let dir = scratch_dir("zero");
        let path = dir.join(FILE_NAME);
        std::fs::write(&path, "[pipeline]\nchannel = \"backpressure\"\ncapacity = 0\n").unwrap();
        assert!(matches!(
            RingvmConfig::load_from(&path),
            Err(ConfigError::Invalid { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fail_fast_needs_room_for_phase_and_seed() {
        let dir = scratch_dir("fail-fast");
        let path = dir.join(FILE_NAME);
        std::fs::write(&path, "[pipeline]\nchannel = \"fail-fast\"\ncapacity = 1\n").unwrap();
        let err = RingvmConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("at least 2"));

        std::fs::write(&path, "[pipeline]\nchannel = \"fail-fast\"\ncapacity = 2\n").unwrap();
        assert_eq!(
            RingvmConfig::load_from(&path).unwrap().pipeline.policy(),
            ChannelPolicy::fail_fast(2)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn find_from_searches_ancestors() {
        let dir = scratch_dir("ancestors");
        let nested = dir.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.join(FILE_NAME), "[pipeline]\nseed = 9\n").unwrap();

        let (path, cfg) = RingvmConfig::find_from(&nested).unwrap().expect("config found");
        assert_eq!(path, dir.join(FILE_NAME));
        assert_eq!(cfg.pipeline.seed, 9);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_explicit_path_is_a_read_error() {
        let dir = scratch_dir("missing");
        let err = RingvmConfig::resolve(Some(&dir.join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
