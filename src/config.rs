use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::{CanvasSize, ImagesCountRange};
use crate::pipeline::BatchPlan;
use crate::raster::FlatColor;

/// Top-level configuration for geostamp.
///
/// Every section falls back to its defaults when missing from the file, so a
/// config only needs the keys it changes.
///
/// # Loading
///
/// ```rust,no_run
/// use geostamp::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.generation.time_zone = Some("Europe/Kyiv".into());
/// config.output.dry_run = true;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What each image looks like and how timestamps are rendered.
    pub generation: GenerationConfig,
    /// Multi-point batch settings.
    pub batch: BatchConfig,
    /// Where images are written.
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Images per timestamp in single mode.
    pub count: usize,
    /// IANA zone name. `None` uses the system zone.
    pub time_zone: Option<String>,
    /// `None` picks a random palette color per image.
    pub color: Option<FlatColor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub count_range: ImagesCountRange,
    pub min_offset_minutes: i64,
    pub max_offset_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// If `true`, generate but do not write any files.
    pub dry_run: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            canvas_width: 100,
            canvas_height: 100,
            count: 1,
            time_zone: None,
            color: None,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count_range: ImagesCountRange::Low,
            min_offset_minutes: 5,
            max_offset_minutes: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("generated"),
            dry_run: false,
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    pub fn canvas_size(&self) -> Result<CanvasSize> {
        CanvasSize::new(self.generation.canvas_width, self.generation.canvas_height)
            .context("Invalid canvas size in config")
    }

    /// The batch offset range, rejecting negative or reversed bounds.
    pub fn offset_bounds(&self) -> Result<(TimeDelta, TimeDelta)> {
        let (min, max) = (self.batch.min_offset_minutes, self.batch.max_offset_minutes);
        if min < 0 || max < 0 {
            anyhow::bail!("Batch offsets must not be negative (got {min}..{max} minutes)");
        }
        if min > max {
            anyhow::bail!("Batch min_offset_minutes ({min}) exceeds max_offset_minutes ({max})");
        }
        let to_delta = |m: i64| {
            TimeDelta::try_minutes(m)
                .with_context(|| format!("Batch offset of {m} minutes is too large"))
        };
        Ok((to_delta(min)?, to_delta(max)?))
    }

    /// Parse the configured time zone. `None` means the system zone.
    pub fn time_zone(&self) -> Result<Option<chrono_tz::Tz>> {
        self.generation
            .time_zone
            .as_deref()
            .map(parse_time_zone)
            .transpose()
    }

    /// Batch plan starting at `first_date` with this config's range, offsets
    /// and canvas.
    pub fn batch_plan(&self, first_date: DateTime<Utc>) -> Result<BatchPlan> {
        let (min_offset, max_offset) = self.offset_bounds()?;
        Ok(BatchPlan {
            first_date,
            count_range: self.batch.count_range,
            min_offset,
            max_offset,
            size: self.canvas_size()?,
        })
    }
}

/// Parse an IANA zone name such as `Europe/Kyiv`.
pub fn parse_time_zone(name: &str) -> Result<chrono_tz::Tz> {
    name.parse::<chrono_tz::Tz>()
        .map_err(|e| anyhow::anyhow!("Unknown time zone '{name}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.canvas_size().unwrap(), CanvasSize::square(100).unwrap());
        assert_eq!(config.generation.count, 1);
        assert_eq!(config.generation.time_zone, None);
        assert_eq!(config.generation.color, None);
        assert_eq!(config.batch.count_range, ImagesCountRange::Low);
        assert_eq!(
            config.offset_bounds().unwrap(),
            (TimeDelta::minutes(5), TimeDelta::minutes(60))
        );
        assert_eq!(config.output.directory, PathBuf::from("generated"));
        assert!(!config.output.dry_run);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.generation.color = Some(FlatColor::Teal);
        config.generation.time_zone = Some("Asia/Tokyo".into());
        config.batch.count_range = ImagesCountRange::High;
        config.save(Some(path.as_path())).unwrap();

        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load(Some(dir.path().join("nope.json").as_path())).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"generation": {"canvas_width": 640}, "batch": {"count_range": "medium"}}"#,
        )
        .unwrap();

        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded.generation.canvas_width, 640);
        assert_eq!(loaded.generation.canvas_height, 100);
        assert_eq!(loaded.batch.count_range, ImagesCountRange::Medium);
        assert_eq!(loaded.batch.max_offset_minutes, 60);
        assert_eq!(loaded.output, OutputConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn zero_canvas_is_rejected() {
        let mut config = Config::default();
        config.generation.canvas_height = 0;
        assert!(config.canvas_size().is_err());
        assert!(config.batch_plan(Utc::now()).is_err());
    }

    #[test]
    fn bad_offsets_are_rejected() {
        let mut config = Config::default();
        config.batch.min_offset_minutes = 90;
        assert!(config.offset_bounds().is_err());

        config.batch.min_offset_minutes = -1;
        assert!(config.offset_bounds().is_err());
    }

    #[test]
    fn time_zone_parsing() {
        let mut config = Config::default();
        assert_eq!(config.time_zone().unwrap(), None);

        config.generation.time_zone = Some("Europe/Kyiv".into());
        assert_eq!(config.time_zone().unwrap(), Some(chrono_tz::Europe::Kyiv));

        config.generation.time_zone = Some("Mars/Olympus".into());
        assert!(config.time_zone().is_err());
    }

    #[test]
    fn batch_plan_uses_config_values() {
        let mut config = Config::default();
        config.batch.count_range = ImagesCountRange::High;
        config.batch.min_offset_minutes = 1;
        config.batch.max_offset_minutes = 2;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let plan = config.batch_plan(start).unwrap();
        assert_eq!(plan.first_date, start);
        assert_eq!(plan.count_range, ImagesCountRange::High);
        assert_eq!(
            (plan.min_offset, plan.max_offset),
            (TimeDelta::minutes(1), TimeDelta::minutes(2))
        );
        assert_eq!(plan.size, CanvasSize::square(100).unwrap());
    }
}
