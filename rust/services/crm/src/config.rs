use config::{Config, ConfigError, Environment, File};
use crm_db::{mongodb::DEFAULT_MONGODB_URL, repository::DEFAULT_PAGE_SIZE, schemas::DATABASE_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional settings file, looked up as `crm.toml`, `crm.json` and so on.
pub const CONFIG_FILE_NAME: &str = "crm";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// connection string for mongodb
    pub mongo_url: String,
    /// defaults to 'estate_crm'
    pub database_name: String,
    /// page size used when a caller does not ask for one
    pub default_page_size: u64,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(Path::new(CONFIG_FILE_NAME))
}

/// Reads defaults, then the optional settings file at `path`, then the
/// environment. Later sources win.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    dotenv::dotenv().ok();

    let settings = Config::builder()
        .set_default("mongo_url", DEFAULT_MONGODB_URL)?
        .set_default("database_name", DATABASE_NAME)?
        .set_default("default_page_size", DEFAULT_PAGE_SIZE)?
        .add_source(File::from(path).required(false))
        .add_source(Environment::default().try_parsing(true))
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    if config.default_page_size == 0 {
        return Err(ConfigError::Message(
            "default_page_size must be greater than zero".to_string(),
        ));
    }
    log::debug!(
        "Loaded config for database '{}' (page size {})",
        config.database_name,
        config.default_page_size
    );
    Ok(config)
}
