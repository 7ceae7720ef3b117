use std::path::{
    Path,
    PathBuf,
};

use color_eyre::eyre::eyre;
use directories::ProjectDirs;
use pigeon70::ProtocolConfig;

use crate::Error;

#[derive(Debug)]
pub struct AppFiles {
    project_dirs: ProjectDirs,
}

impl AppFiles {
    pub fn new() -> Result<Self, Error> {
        let project_dirs = ProjectDirs::from("", "", "pigeon70")
            .ok_or_else(|| eyre!("Could not determine project directories"))?;
        Ok(Self { project_dirs })
    }

    fn config_dir(&self) -> &Path {
        self.project_dirs.config_dir()
    }

    pub fn protocol_config_path(&self) -> PathBuf {
        self.config_dir().join("protocol.toml")
    }
}

/// Loads the protocol configuration.
///
/// An explicitly given file must exist. Otherwise the file in the config
/// directory is used if present, and the Pigeon70 preset if not.
pub fn protocol_config(path: Option<&Path>) -> Result<ProtocolConfig, Error> {
    let config = match path {
        Some(path) => read_protocol_config(path)?,
        None => {
            let path = match AppFiles::new() {
                Ok(files) => Some(files.protocol_config_path()),
                Err(error) => {
                    tracing::debug!(%error, "no config directory");
                    None
                }
            };

            match path {
                Some(path) if path.exists() => read_protocol_config(&path)?,
                _ => ProtocolConfig::default(),
            }
        }
    };

    config.validate()?;
    Ok(config)
}

fn read_protocol_config(path: &Path) -> Result<ProtocolConfig, Error> {
    tracing::debug!(path = %path.display(), "Loading protocol configuration from file");
    let toml = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&toml)?)
}
