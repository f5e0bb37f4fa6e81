use crate::config::AmbientConfig;
use clap::Parser;
use std::path::PathBuf;

/// Ambient sound daemon that steps aside for other audio
#[derive(Debug, Parser)]
#[command(name = "space-ambient")]
#[command(about = "Plays ambient tracks in the background and pauses while other applications are audible")]
#[command(version)]
pub struct CliApp {
    /// TOML configuration file to read (never written)
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Directory to load .ogg/.oga ambient tracks from
    #[arg(long, value_name = "DIR")]
    pub tracks: Option<String>,

    /// Output device name; the default device is used when absent or not found
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Milliseconds between activity checks
    #[arg(long, value_name = "N")]
    pub monitor_interval_ms: Option<u64>,

    /// Do not talk to KWin or listen for the media-control shortcut
    #[arg(long)]
    pub no_desktop_integration: bool,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.as_deref().map(Self::expand_path)
    }

    /// Overlay command-line flags onto a loaded configuration
    pub fn apply(&self, config: &mut AmbientConfig) {
        if let Some(tracks) = &self.tracks {
            config.track_directory = Self::expand_path(tracks);
        }
        if let Some(device) = &self.device {
            config.device_name_hint = Some(device.clone());
        }
        if let Some(interval) = self.monitor_interval_ms {
            config.monitor_interval_ms = interval;
        }
        if self.no_desktop_integration {
            config.desktop_integration = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliApp {
        CliApp::try_parse_from(std::iter::once("space-ambient").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_arguments() {
        let cli = parse(&[]);
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());

        let mut config = AmbientConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, AmbientConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "--tracks",
            "/srv/ambient",
            "--device",
            "USB Audio",
            "--monitor-interval-ms",
            "750",
            "--log-level",
            "debug",
            "--no-desktop-integration",
        ]);

        let mut config = AmbientConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.track_directory, PathBuf::from("/srv/ambient"));
        assert_eq!(config.device_name_hint.as_deref(), Some("USB Audio"));
        assert_eq!(config.monitor_interval_ms, 750);
        assert!(!config.desktop_integration);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_rejects_bad_interval() {
        let result = CliApp::try_parse_from(["space-ambient", "--monitor-interval-ms", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_subcommands() {
        assert!(CliApp::try_parse_from(["space-ambient", "play"]).is_err());
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(CliApp::expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(CliApp::expand_path("~/tracks"), home.join("tracks"));
            assert_eq!(CliApp::expand_path("~"), home);
        }
    }
}
