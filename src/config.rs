use crate::error::{Result, TsError};
use crate::utils::BufferMode;
use std::env;
use std::fs;
use std::path::Path;
use url::Url;

/// Files consulted by [`Config::load`], in order.
pub const CONFIG_PATHS: [&str; 2] = ["./tsdemux.toml", "./tsdemux_config.toml"];

/// Prefix of the environment variables consulted by [`Config::load`].
pub const ENV_PREFIX: &str = "TSDEMUX_";

/// Demuxer and consumer-buffer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Treat a padded, non-unit-start packet as the end of an unbounded PES
    /// unit. Splits frames early on bursty padding; without it a unit only
    /// ends at the next unit start.
    pub guess_video_frame_end: bool,
    /// Live source: consumer buffers evict and do not collect timestamps.
    pub streaming: bool,
    pub video_buffer_size: usize,
    pub audio_buffer_size: usize,
    /// Read size used by the upstream source adapters.
    pub chunk_size: usize,
    pub source_url: Option<Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            guess_video_frame_end: true,
            streaming: false,
            video_buffer_size: 512 * 1024,
            audio_buffer_size: 128 * 1024,
            chunk_size: 1024 * 1024,
            source_url: None,
        }
    }
}

impl Config {
    /// Defaults, overridden by `TSDEMUX_*` environment variables, overridden
    /// by the first readable file in [`CONFIG_PATHS`].
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        for (key, value) in env::vars() {
            if let Some(key) = key.strip_prefix(ENV_PREFIX) {
                config.set(&key.to_ascii_lowercase(), &value)?;
            }
        }

        for path in &CONFIG_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                log::debug!("loading config from {}", path);
                config.apply_str(&content)?;
                break;
            }
        }

        Ok(config)
    }

    /// Applies `key = value` lines. Blank lines and `#` comments are ignored;
    /// values may be quoted.
    pub fn apply_str(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| TsError::Config(format!("expected key = value, got {:?}", line)))?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    /// Sets a single option by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "guess_video_frame_end" => self.guess_video_frame_end = parse_bool(key, value)?,
            "streaming" => self.streaming = parse_bool(key, value)?,
            "video_buffer_size" => self.video_buffer_size = value.parse()?,
            "audio_buffer_size" => self.audio_buffer_size = value.parse()?,
            "chunk_size" => {
                self.chunk_size = value.parse()?;
                if self.chunk_size == 0 {
                    return Err(TsError::Config("chunk_size must be positive".into()));
                }
            }
            "source_url" => {
                if !value.is_empty() {
                    self.set_source_url(value)?;
                }
            }
            _ => log::warn!("ignoring unknown config key {:?}", key),
        }
        Ok(())
    }

    /// Sets the source URL; WebSocket URLs mark the source as streaming.
    pub fn set_source_url(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url)?;
        if matches!(url.scheme(), "ws" | "wss") {
            self.streaming = true;
        }
        self.source_url = Some(url);
        Ok(())
    }

    /// Buffer policy matching the source kind.
    pub fn buffer_mode(&self) -> BufferMode {
        if self.streaming {
            BufferMode::Evict
        } else {
            BufferMode::Expand
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(TsError::Config(format!("{} expects a boolean, got {:?}", key, value))),
    }
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        fs::write(path, DEFAULT_TEMPLATE)?;
    }
    Ok(())
}

/// Commented template written by [`create_default_config_template`].
pub const DEFAULT_TEMPLATE: &str = r#"# tsdemux configuration
# Every key may also be set through a TSDEMUX_<KEY> environment variable.

# End unbounded video units at padded transport packets
guess_video_frame_end = true

# Live source: buffers evict old data and seeking is disabled
streaming = false

video_buffer_size = 524288
audio_buffer_size = 131072
chunk_size = 1048576

# ws:// and wss:// URLs imply streaming = true
# source_url = "wss://example.com/stream"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_matches_defaults() {
        let mut config = Config::default();
        config.apply_str(DEFAULT_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_apply_str() {
        let mut config = Config::default();
        config
            .apply_str(
                "guess_video_frame_end = off\n\
                 video_buffer_size = '2048'\n\
                 source_url = \"ws://localhost:8080/live\"\n",
            )
            .unwrap();

        assert!(!config.guess_video_frame_end);
        assert_eq!(config.video_buffer_size, 2048);
        assert!(config.streaming);
        assert_eq!(config.buffer_mode(), BufferMode::Evict);
        assert_eq!(config.source_url.unwrap().host_str(), Some("localhost"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        assert!(matches!(config.set("streaming", "maybe"), Err(TsError::Config(_))));
        assert!(matches!(config.set("chunk_size", "abc"), Err(TsError::ParseInt(_))));
        assert!(config.set("chunk_size", "0").is_err());
        assert!(matches!(config.set("source_url", "not a url"), Err(TsError::Url(_))));
        assert!(config.apply_str("no equals sign").is_err());
    }

    #[test]
    fn test_http_source_stays_static() {
        let mut config = Config::default();
        config.set_source_url("https://example.com/video.ts").unwrap();
        assert!(!config.streaming);
        assert_eq!(config.buffer_mode(), BufferMode::Expand);
    }
}
