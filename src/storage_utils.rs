use crate::dramatic_moves::ScanParams;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

// CONFIGURATION STRUCTS
// Every field has a default so a partial config.json still loads.

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,  // e.g., "https://query1.finance.yahoo.com"
    pub interval: String,  // e.g., "1d"
    pub history_days: i64, // how far back each fetch reaches
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            interval: "1d".to_string(),
            history_days: 730,
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) chart-swipe/0.1".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_attempts: usize,
    pub min_quotes: usize,  // datasets shorter than this are skipped outright
    pub min_visible: usize, // lower bound tolerating missing trading days
    pub min_future: usize,
    pub scan: ScanParams,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            min_quotes: 100,
            min_visible: 50,
            min_future: 5,
            scan: ScanParams::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub selection: SelectionConfig,
    /// Regex a catalog symbol must match to be played, e.g. "^(TCS|INFY)\\.NS$".
    pub symbol_filter: Option<String>,
    pub rsi_period: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            selection: SelectionConfig::default(),
            symbol_filter: None,
            rsi_period: 14,
        }
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path of the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Storage directory resolved next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// Storage rooted at an explicit directory, created if missing.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// Serializes `data` to `<filename>.json`.
    /// Writes a `.tmp` sibling first and renames it over the target, so a crash
    /// mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json validates UTF-8 itself, so read raw bytes.
        let content = fs::read(self.path_for(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Loads `filename`, or writes and returns the default when the file is
    /// absent. A file that exists but does not parse is an error, never
    /// silently replaced.
    pub async fn load_or_init<T>(&self, filename: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        if !fs::try_exists(self.path_for(filename)).await? {
            let value = T::default();
            self.save(filename, &value).await?;
            info!(file = filename, "wrote default file");
            return Ok(value);
        }
        self.load(filename).await
    }

    /// Like `load`, but a missing file is `None`.
    pub async fn load_optional<T: DeserializeOwned>(
        &self,
        filename: &str,
    ) -> anyhow::Result<Option<T>> {
        if fs::try_exists(self.path_for(filename)).await? {
            self.load(filename).await.map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path().join("storage"))
            .await
            .unwrap();

        let mut config = AppConfig::default();
        config.selection.max_attempts = 3;
        config.symbol_filter = Some("^TCS".to_string());
        storage.save("config", &config).await.unwrap();

        let loaded: AppConfig = storage.load("config").await.unwrap();
        assert_eq!(loaded.selection.max_attempts, 3);
        assert_eq!(loaded.symbol_filter.as_deref(), Some("^TCS"));
        assert!(!storage.base_dir.join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn load_or_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();

        let first: AppConfig = storage.load_or_init("config").await.unwrap();
        assert_eq!(first.selection.max_attempts, 15);
        assert!(storage.path_for("config").exists());

        tokio::fs::write(storage.path_for("config"), br#"{"rsi_period": 9}"#)
            .await
            .unwrap();
        let second: AppConfig = storage.load_or_init("config").await.unwrap();
        assert_eq!(second.rsi_period, 9);
        assert_eq!(second.provider.history_days, 730);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();
        tokio::fs::write(storage.path_for("config"), b"{not json")
            .await
            .unwrap();

        let result: anyhow::Result<AppConfig> = storage.load_or_init("config").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_optional_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();
        let symbols: Option<Vec<String>> = storage.load_optional("symbols").await.unwrap();
        assert!(symbols.is_none());
    }

    #[tokio::test]
    async fn optional_file_that_cannot_be_checked_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        tokio::fs::write(&blocker, b"not a directory").await.unwrap();

        // A regular file where the storage directory should be.
        let storage = AsyncStorageManager { base_dir: blocker };
        let result: anyhow::Result<Option<Vec<String>>> = storage.load_optional("symbols").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn present_optional_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();
        let saved = vec!["TCS.NS".to_string()];
        storage.save("symbols", &saved).await.unwrap();

        let symbols: Option<Vec<String>> = storage.load_optional("symbols").await.unwrap();
        assert_eq!(symbols, Some(saved));
    }
}
