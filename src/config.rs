//! Configuration: a YAML file for bot settings, environment variables for
//! credentials.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// The home FRC team, used when a command omits the team argument.
  pub team_number: u32,
  /// Guild the slash commands are registered in.
  pub guild_id: u64,

  /// Matches shown per page in schedule/history replies.
  #[serde(default = "default_matches_per_page")]
  pub matches_per_page: usize,
  /// How long a paginated message keeps responding to its buttons.
  #[serde(default = "default_session_timeout_secs")]
  pub session_timeout_secs: u64,

  /// Override for the response cache database location.
  pub cache_path: Option<PathBuf>,
  /// Keep the response cache in memory only.
  #[serde(default)]
  pub ephemeral_cache: bool,
}

fn default_matches_per_page() -> usize {
  8
}

fn default_session_timeout_secs() -> u64 {
  900
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pitbot.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pitbot/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/pitbot/config.yaml\n\
         with at least `team_number` and `guild_id`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pitbot.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pitbot").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The TBA API key from the environment.
  pub fn tba_api_key() -> Result<String> {
    std::env::var("TBA_API_KEY")
      .map_err(|_| eyre!("TBA API key not found. Set the TBA_API_KEY environment variable."))
  }

  /// The Discord bot token from the environment.
  pub fn discord_token() -> Result<String> {
    std::env::var("DISCORD_TOKEN")
      .map_err(|_| eyre!("Discord token not found. Set the DISCORD_TOKEN environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn minimal_config_gets_defaults() {
    let config: Config = serde_yaml::from_str("team_number: 604\nguild_id: 1234").unwrap();
    assert_eq!(config.team_number, 604);
    assert_eq!(config.guild_id, 1234);
    assert_eq!(config.matches_per_page, 8);
    assert_eq!(config.session_timeout_secs, 900);
    assert!(config.cache_path.is_none());
    assert!(!config.ephemeral_cache);
  }

  #[test]
  fn overrides_are_honored() {
    let config: Config = serde_yaml::from_str(
      "team_number: 604\nguild_id: 1\nmatches_per_page: 5\nephemeral_cache: true",
    )
    .unwrap();
    assert_eq!(config.matches_per_page, 5);
    assert!(config.ephemeral_cache);
  }
}
