//! OA Console Core 配置模块
//!
//! 该模块提供了控制台的配置管理功能，包括：
//! - 配置文件（单文件或目录）加载和解析
//! - 环境特定配置覆盖
//! - 日志配置与侧边栏服务配置定义

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

mod manager;
pub use manager::ConfigManager;

/// 全局应用配置实例，使用 OnceLock 确保只初始化一次
static APP_CONFIG: OnceLock<ConsoleAppConfig> = OnceLock::new();

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否输出 target
    #[serde(default = "default_true")]
    pub with_target: bool,
    /// 是否输出线程ID
    #[serde(default)]
    pub with_thread_ids: bool,
    /// 是否输出文件名
    #[serde(default)]
    pub with_file: bool,
    /// 是否输出行号
    #[serde(default)]
    pub with_line_number: bool,
    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_true() -> bool {
    true
}

/// 会话侧边栏服务配置（文件中所有字段均可省略）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SidebarServiceConfig {
    /// 当前状态筛选（all / unread / read / deposit / withdraw / issue / closed）
    #[serde(default)]
    pub status_filter: Option<String>,
    /// 当前侧边栏页码（从 1 开始）
    #[serde(default)]
    pub page: Option<u32>,
    /// 计时器刷新周期（毫秒）
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    /// 本地管理员邮箱（用于过滤自己发出的消息通知）
    #[serde(default)]
    pub admin_email: Option<String>,
    /// 当前启用的 OA 分组
    #[serde(default)]
    pub active_group_ids: Option<Vec<i64>>,
    /// 后端 REST 基础地址
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// 侧边栏刷新请求超时（毫秒）
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// 计时器快照文件路径
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

/// 服务配置集合
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServicesConfig {
    /// 会话侧边栏服务配置
    #[serde(default)]
    pub sidebar: Option<SidebarServiceConfig>,
}

/// OA Console 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConsoleAppConfig {
    /// 应用名称
    #[serde(default)]
    pub name: Option<String>,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 服务配置
    #[serde(default)]
    pub services: ServicesConfig,
}

impl ConsoleAppConfig {
    /// 获取会话侧边栏服务配置
    pub fn sidebar_service(&self) -> SidebarServiceConfig {
        self.services.sidebar.clone().unwrap_or_default()
    }

    /// 获取应用名称
    pub fn app_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("oa-console")
    }
}

/// 加载配置
///
/// 未指定路径时依次尝试 `config` 目录与 `config.toml` 文件，全部失败则回退到默认配置。
/// 可通过 `OA_CONSOLE_CONFIG` 环境变量覆盖默认路径。
pub fn load_config(path: Option<&str>) -> &'static ConsoleAppConfig {
    APP_CONFIG.get_or_init(|| load_config_uncached(path))
}

/// 获取已加载的应用配置（未加载时返回 None）
pub fn app_config() -> Option<&'static ConsoleAppConfig> {
    APP_CONFIG.get()
}

/// 加载配置但不写入全局实例（测试与工具使用）
pub fn load_config_uncached(path: Option<&str>) -> ConsoleAppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => match env::var("OA_CONSOLE_CONFIG") {
            Ok(p) if !p.is_empty() => vec![PathBuf::from(p)],
            _ => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
        },
    };

    let mut cfg = load_with_fallback(&candidates);
    if let Err(e) = ConfigManager::load_environment_config(&mut cfg) {
        warn!("failed to load environment config: {}", e);
    }
    cfg
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> ConsoleAppConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    ConsoleAppConfig::default()
}

/// 从源加载配置
pub fn load_config_from_source(path: &Path) -> Result<ConsoleAppConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    if metadata.is_dir() {
        load_config_from_directory(path)
    } else {
        load_config_from_file(path)
    }
}

/// 从文件加载配置
fn load_config_from_file(path: &Path) -> Result<ConsoleAppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    let cfg: ConsoleAppConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config format: {}", path.display()))?;
    Ok(cfg)
}

/// 从目录加载配置（base.toml + shared/ + services/ + overrides/）
fn load_config_from_directory(path: &Path) -> Result<ConsoleAppConfig> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;

    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("shared"))?;
    merge_directory(&mut merged, &path.join("services"))?;
    merge_directory(&mut merged, &path.join("overrides"))?;

    let cfg: ConsoleAppConfig = merged
        .try_into()
        .with_context(|| format!("invalid configuration after merging {}", path.display()))?;

    Ok(cfg)
}

/// 合并目录中的配置片段（按文件名排序）
fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

/// 加载 TOML 值
pub(crate) fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 合并值（表递归合并，其余类型直接覆盖）
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(
            &file,
            r#"
name = "console-test"

[logging]
level = "info"

[services.sidebar]
status_filter = "issue"
tick_interval_ms = 500
active_group_ids = [1, 2]
"#,
        )
        .unwrap();

        let cfg = load_config_from_source(&file).unwrap();
        assert_eq!(cfg.app_name(), "console-test");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.with_target);

        let sidebar = cfg.sidebar_service();
        assert_eq!(sidebar.status_filter.as_deref(), Some("issue"));
        assert_eq!(sidebar.tick_interval_ms, Some(500));
        assert_eq!(sidebar.active_group_ids, Some(vec![1, 2]));
        assert!(sidebar.admin_email.is_none());
    }

    #[test]
    fn test_load_directory_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            "[services.sidebar]\nstatus_filter = \"all\"\npage = 1\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("overrides")).unwrap();
        fs::write(
            dir.path().join("overrides").join("10-local.toml"),
            "[services.sidebar]\npage = 3\nadmin_email = \"ops@example.com\"\n",
        )
        .unwrap();

        let cfg = load_config_from_source(dir.path()).unwrap();
        let sidebar = cfg.sidebar_service();
        assert_eq!(sidebar.status_filter.as_deref(), Some("all"));
        assert_eq!(sidebar.page, Some(3));
        assert_eq!(sidebar.admin_email.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_missing_base_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_from_source(dir.path()).is_err());
    }

    #[test]
    fn test_fallback_to_defaults() {
        let cfg = load_with_fallback(&[PathBuf::from("/nonexistent/oa-console.toml")]);
        assert_eq!(cfg.app_name(), "oa-console");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.services.sidebar.is_none());
    }

    #[test]
    fn test_merge_value_overwrites_scalars() {
        let mut base: Value = toml::from_str("a = 1\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: Value = toml::from_str("a = 5\n[t]\ny = 9\nz = 3\n").unwrap();
        merge_value(&mut base, overlay);

        assert_eq!(base["a"].as_integer(), Some(5));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(9));
        assert_eq!(base["t"]["z"].as_integer(), Some(3));
    }
}
