// Shakewatch - Demo Command Line
//
// Arguments of the `shakewatch` demo binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::config::DetectorConfig;

/// Replay a synthetic shake through a live detection session
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Detector config as a JSON object; defaults are used when omitted
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn load_config(&self) -> anyhow::Result<DetectorConfig> {
        let Some(path) = &self.config else {
            return Ok(DetectorConfig::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        let config = DetectorConfig::from_json(&json)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::ffi::OsStr;

    #[test]
    fn help_prints_usage_instead_of_loading_a_file() {
        let err = Cli::try_parse_from(["shakewatch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn no_argument_means_default_config() {
        let cli = Cli::try_parse_from(["shakewatch"]).unwrap();
        assert!(cli.config.is_none());
        assert_eq!(cli.load_config().unwrap(), DetectorConfig::default());
    }

    #[test]
    fn config_file_is_read_and_validated() {
        let dir = std::env::temp_dir().join(format!("shakewatch-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.json");
        let bad = dir.join("bad.json");
        std::fs::write(&good, r#"{"maxSamples": 40, "useAudioClassifier": false}"#).unwrap();
        std::fs::write(&bad, r#"{"maxSamples": 0}"#).unwrap();

        let cli = Cli::try_parse_from([OsStr::new("shakewatch"), good.as_os_str()]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.max_samples, 40);
        assert!(!config.use_audio_classifier);

        let cli = Cli::try_parse_from([OsStr::new("shakewatch"), bad.as_os_str()]).unwrap();
        assert!(cli.load_config().is_err());

        let missing = Cli::try_parse_from(["shakewatch", "/nonexistent/shakewatch.json"]).unwrap();
        let err = missing.load_config().unwrap_err();
        assert!(err.to_string().contains("could not read config file"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
