use anyhow::Result;
use serial_test::serial;
use std::io::Write;

use crate::config::{load_config, load_config_from, AppConfig};
use crm_db::{mongodb::DEFAULT_MONGODB_URL, repository::DEFAULT_PAGE_SIZE, schemas::DATABASE_NAME};

const VARS: [&str; 3] = ["MONGO_URL", "DATABASE_NAME", "DEFAULT_PAGE_SIZE"];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_apply_without_file_or_env() -> Result<()> {
    clear_env();
    let dir = tempfile::tempdir()?;
    let config = load_config_from(&dir.path().join("missing"))?;
    assert_eq!(
        config,
        AppConfig {
            mongo_url: DEFAULT_MONGODB_URL.to_string(),
            database_name: DATABASE_NAME.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    );
    Ok(())
}

#[test]
#[serial]
fn environment_overrides_file() -> Result<()> {
    clear_env();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("crm.toml");
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "database_name = \"from_file\"")?;
    writeln!(file, "default_page_size = 25")?;

    std::env::set_var("DATABASE_NAME", "from_env");
    let config = load_config_from(&path);
    clear_env();
    let config = config?;

    assert_eq!(config.database_name, "from_env");
    assert_eq!(config.default_page_size, 25);
    Ok(())
}

#[test]
#[serial]
fn zero_page_size_is_rejected() {
    clear_env();
    std::env::set_var("DEFAULT_PAGE_SIZE", "0");
    let result = load_config();
    clear_env();
    assert!(result.is_err());
}
