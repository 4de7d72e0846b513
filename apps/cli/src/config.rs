use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Bearer token the mobile client authenticates with. Generated and
    /// persisted on first run when absent.
    pub api_token: Option<String>,
    pub api_user: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_token: None,
            api_user: "local-user".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ServerConfig,
    pub file: PathBuf,
    pub created: bool,
}

pub fn load_or_create(data_dir: &Path) -> Result<ConfigLoad, String> {
    fs::create_dir_all(data_dir)
        .map_err(|err| format!("create data dir {}: {}", data_dir.display(), err))?;
    let file = data_dir.join(CONFIG_FILE_NAME);

    if file.exists() {
        let contents = fs::read_to_string(&file)
            .map_err(|err| format!("read config {}: {}", file.display(), err))?;
        let config: ServerConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    let config = ServerConfig::default();
    write_config(&file, &config)?;
    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}

pub fn write_config(file: &Path, config: &ServerConfig) -> Result<(), String> {
    let contents =
        toml::to_string_pretty(config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(file, contents).map_err(|err| format!("write config {}: {}", file.display(), err))
}
