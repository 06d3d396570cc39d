//! Configuration

use anyhow::Context;
use castate::AdapterConfig;
use std::path::Path;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "castate.json";

/// Loads the adapter config: file (or defaults), then `.env` and `CASTATE_*`
pub fn load(path: Option<&Path>) -> anyhow::Result<AdapterConfig> {
    dotenvy::dotenv().ok();

    let config = match path {
        Some(path) => AdapterConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AdapterConfig::load_or_default(DEFAULT_CONFIG_FILE)?,
    };
    Ok(config.with_env()?)
}

/// Writes the default config, refusing to overwrite
pub fn init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    AdapterConfig::default().save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_overwrite() {
        let path = std::env::temp_dir().join(format!("castate-cli-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);

        init(&path).unwrap();
        assert!(init(&path).is_err());
        assert_eq!(load(Some(&path)).unwrap().provider_slot, "ethereum");

        std::fs::remove_file(&path).unwrap();
    }
}
