//! Parameter files on disk (pretty-printed JSON objects)

use std::path::Path;

use crate::core::types::Result;
use crate::params::tree_params::TreeParams;

/// File extension for parameter files
pub const PARAMS_FILE_EXTENSION: &str = "json";

impl TreeParams {
    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to file (async)
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Load from file (async)
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }

    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TreeError;
    use tempfile::TempDir;

    #[test]
    fn test_params_persistence() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("presets").join("fir.json");

        let params = TreeParams::balsam_fir();
        params.save_sync(&path).expect("save failed");

        let loaded = TreeParams::load_sync(&path).expect("load failed");
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "levels": 2, "flare": 0.0, "unused": true }"#).unwrap();

        let loaded = TreeParams::load_sync(&path).expect("load failed");
        assert_eq!(loaded.levels, 2);
        assert_eq!(loaded.flare, 0.0);
        assert_eq!(loaded.g_scale, TreeParams::default().g_scale);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let result = TreeParams::load_sync(&temp_dir.path().join("nope.json"));
        assert!(matches!(result, Err(TreeError::Io(_))));
    }

    #[test]
    fn test_async_persistence() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("palm.json");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build runtime");

        let loaded = runtime.block_on(async {
            TreeParams::palm().save(&path).await.expect("save failed");
            TreeParams::load(&path).await.expect("load failed")
        });
        assert_eq!(loaded, TreeParams::palm());
    }
}
