//! Application configuration module / 应用配置模块
//!
//! Loaded from config.json in the working directory; a default file (with a
//! freshly generated admin token) is written on first run.
//! 首次运行时创建默认配置文件

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::ItemType;

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Search and ranking configuration / 搜索配置
    #[serde(default)]
    pub search: SearchConfig,
    /// Which item fields are indexed / 索引字段选择
    #[serde(default)]
    pub fields: FieldSelection,
    /// Index build configuration / 索引构建配置
    #[serde(default)]
    pub build: BuildConfig,
    /// Token required by the admin control endpoints / 管理接口令牌
    #[serde(default)]
    pub admin_token: String,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Host content database (relative to data_dir) / 主数据库文件
    pub db_file: String,
    /// Search database directory (relative to data_dir) / 搜索数据库目录
    pub search_db_dir: String,
    /// Search database file name / 搜索数据库文件名
    pub search_db_file: String,
}

/// Which search path serves queries / 查询路由策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Index when usable, unindexed scan otherwise
    Auto,
    /// Prefer the index; an absent index still falls back
    Index,
    /// Always the unindexed scan
    Fallback,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub mode: SearchMode,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Markup inserted before a highlighted term / 高亮开始标记
    pub highlight_open: String,
    /// Markup inserted after a highlighted term / 高亮结束标记
    pub highlight_close: String,
    pub suggestion_count: usize,
    /// Characters of body text used when an item has no excerpt
    pub excerpt_length: usize,
    pub field_weights: FieldWeights,
    pub type_weights: TypeWeights,
    /// 0 disables the recency boost / 新近度加权
    pub recency_boost: f64,
    /// Item types enumerated by the build and searchable by default
    pub indexed_types: Vec<ItemType>,
}

/// Per-field relevance weights / 字段权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldWeights {
    pub title: f64,
    pub excerpt: f64,
    pub body: f64,
    pub taxonomy: f64,
    pub metadata: f64,
    pub sku: f64,
}

/// Per-type relevance weights / 类型权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeWeights {
    pub page: f64,
    pub post: f64,
    pub product: f64,
    pub attachment: f64,
}

/// Field inclusion settings handed to the content source adapter / 字段选择
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    pub body: bool,
    pub excerpt: bool,
    pub taxonomies: bool,
    /// Metadata keys copied into the index; empty means none
    pub metadata_keys: Vec<String>,
    pub sku: bool,
}

/// Index build configuration / 构建配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub batch_size: BatchSize,
    /// A build lock older than this may be taken over / 锁超时（秒）
    pub lock_timeout_secs: u64,
}

/// Items processed per batch call, always positive / 每批处理条目数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BatchSize(u32);

impl BatchSize {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for BatchSize {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        Ok(Self(value))
    }
}

impl From<BatchSize> for u32 {
    fn from(size: BatchSize) -> Self {
        size.0
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8190,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "content.db".to_string(),
            search_db_dir: "search".to_string(),
            search_db_file: "search.db".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Auto,
            default_page_size: 10,
            max_page_size: 100,
            highlight_open: "<mark>".to_string(),
            highlight_close: "</mark>".to_string(),
            suggestion_count: 5,
            excerpt_length: 200,
            field_weights: FieldWeights::default(),
            type_weights: TypeWeights::default(),
            recency_boost: 0.0,
            indexed_types: ItemType::ALL.to_vec(),
        }
    }
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 10.0,
            excerpt: 4.0,
            body: 1.0,
            taxonomy: 3.0,
            metadata: 2.0,
            sku: 5.0,
        }
    }
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self {
            page: 1.0,
            post: 1.0,
            product: 1.2,
            attachment: 0.5,
        }
    }
}

impl TypeWeights {
    pub fn weight_for(&self, item_type: ItemType) -> f64 {
        match item_type {
            ItemType::Page => self.page,
            ItemType::Post => self.post,
            ItemType::Product => self.product,
            ItemType::Attachment => self.attachment,
        }
    }
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self {
            body: true,
            excerpt: true,
            taxonomies: true,
            metadata_keys: Vec::new(),
            sku: true,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: BatchSize(50),
            lock_timeout_secs: 300,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            search: SearchConfig::default(),
            fields: FieldSelection::default(),
            build: BuildConfig::default(),
            admin_token: String::new(),
        }
    }
}

fn check_weight(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Invalid(format!("{} must be a positive number, got {}", name, value)));
    }
    Ok(())
}

impl AppConfig {
    /// Reject values that would silently break ranking or paging / 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.search.field_weights;
        for (name, value) in [
            ("field_weights.title", w.title),
            ("field_weights.excerpt", w.excerpt),
            ("field_weights.body", w.body),
            ("field_weights.taxonomy", w.taxonomy),
            ("field_weights.metadata", w.metadata),
            ("field_weights.sku", w.sku),
        ] {
            check_weight(name, value)?;
        }
        if !(w.title > w.excerpt && w.excerpt > w.body) {
            return Err(ConfigError::Invalid(
                "field weights must rank title > excerpt > body".to_string(),
            ));
        }

        let t = &self.search.type_weights;
        for item_type in ItemType::ALL {
            check_weight(&format!("type_weights.{}", item_type), t.weight_for(item_type))?;
        }

        if !self.search.recency_boost.is_finite() || self.search.recency_boost < 0.0 {
            return Err(ConfigError::Invalid("recency_boost must be zero or positive".to_string()));
        }
        if self.search.default_page_size == 0 || self.search.max_page_size == 0 {
            return Err(ConfigError::Invalid("page sizes must be positive".to_string()));
        }
        if self.search.default_page_size > self.search.max_page_size {
            return Err(ConfigError::Invalid(
                "default_page_size cannot exceed max_page_size".to_string(),
            ));
        }
        if self.search.highlight_open.is_empty() || self.search.highlight_close.is_empty() {
            return Err(ConfigError::Invalid("highlight markers cannot be empty".to_string()));
        }
        if self.search.indexed_types.is_empty() {
            return Err(ConfigError::Invalid("at least one item type must be indexed".to_string()));
        }
        if self.build.lock_timeout_secs == 0 {
            return Err(ConfigError::Invalid("lock_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Get the host database URL / 获取主数据库URL
    pub fn get_database_url(&self) -> String {
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the full search database path / 获取完整的搜索数据库路径
    pub fn get_search_db_path(&self) -> PathBuf {
        let data_dir = self.get_data_dir();
        if self.database.search_db_dir.is_empty() {
            data_dir.join(&self.database.search_db_file)
        } else {
            data_dir
                .join(&self.database.search_db_dir)
                .join(&self.database.search_db_file)
        }
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Generate a random admin token / 生成随机管理令牌
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, ConfigError> {
    let config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig {
            admin_token: generate_token(),
            ..AppConfig::default()
        };
        save_config_to(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };

    config.validate()?;
    if config.admin_token.is_empty() {
        tracing::warn!("admin_token is empty, index control endpoints will reject every request");
    }
    Ok(config)
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config_path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_batch_size_rejects_zero() {
        assert!(BatchSize::try_from(0).is_err());
        assert_eq!(BatchSize::try_from(25).unwrap().get(), 25);

        let parsed: Result<BuildConfig, _> =
            serde_json::from_str(r#"{"batch_size": 0, "lock_timeout_secs": 10}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_field_weight_order_enforced() {
        let mut config = AppConfig::default();
        config.search.field_weights.body = 20.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.type_weights.product = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_first_load_creates_file_with_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.admin_token.len(), 32);

        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.admin_token, created.admin_token);
        assert_eq!(reloaded.build.batch_size, created.build.batch_size);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"admin_token": "abc", "build": {"batch_size": 7, "lock_timeout_secs": 60}}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.build.batch_size.get(), 7);
        assert_eq!(config.search.mode, SearchMode::Auto);
        assert_eq!(config.server.port, 8190);
    }

    #[test]
    fn test_search_db_path() {
        let config = AppConfig::default();
        assert_eq!(config.get_search_db_path(), PathBuf::from("data/search/search.db"));
    }
}
