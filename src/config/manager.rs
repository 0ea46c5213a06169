//! 配置管理器 - 负责处理不同环境下的配置选择和覆盖
//!
//! - 根据 `OA_CONSOLE_ENV` 选择环境
//! - 加载 `config/environments/{environment}.toml` 并覆盖基础配置

use std::env;
use std::path::Path;

use anyhow::Result;
use toml::Value;

use super::{ConsoleAppConfig, LoggingConfig, SidebarServiceConfig, load_toml_value};

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取当前环境名称
    ///
    /// 从环境变量 OA_CONSOLE_ENV 获取，未设置时默认为 "development"
    pub fn get_environment() -> String {
        env::var("OA_CONSOLE_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置并合并到基础配置中
    pub fn load_environment_config(base_config: &mut ConsoleAppConfig) -> Result<()> {
        let env = Self::get_environment();
        let env_config_path = format!("config/environments/{}.toml", env);
        Self::apply_environment_file(base_config, Path::new(&env_config_path))
    }

    /// 将指定环境文件覆盖到基础配置（文件不存在时忽略）
    pub fn apply_environment_file(base_config: &mut ConsoleAppConfig, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let env_config = load_toml_value(path)?;
        Self::merge_logging(&mut base_config.logging, &env_config);

        if let Some(sidebar) = env_config
            .get("services")
            .and_then(|services| services.get("sidebar"))
        {
            let target = base_config
                .services
                .sidebar
                .get_or_insert_with(SidebarServiceConfig::default);
            Self::merge_sidebar(target, sidebar);
        }

        Ok(())
    }

    /// 合并日志配置
    fn merge_logging(logging: &mut LoggingConfig, env_config: &Value) {
        let Some(table) = env_config.get("logging") else {
            return;
        };

        if let Some(level) = table.get("level").and_then(|v| v.as_str()) {
            logging.level = level.to_string();
        }
        if let Some(flag) = table.get("with_target").and_then(|v| v.as_bool()) {
            logging.with_target = flag;
        }
        if let Some(flag) = table.get("with_thread_ids").and_then(|v| v.as_bool()) {
            logging.with_thread_ids = flag;
        }
        if let Some(flag) = table.get("with_file").and_then(|v| v.as_bool()) {
            logging.with_file = flag;
        }
        if let Some(flag) = table.get("with_line_number").and_then(|v| v.as_bool()) {
            logging.with_line_number = flag;
        }
        if let Some(flag) = table.get("json").and_then(|v| v.as_bool()) {
            logging.json = flag;
        }
    }

    /// 逐个字段合并侧边栏配置
    fn merge_sidebar(config: &mut SidebarServiceConfig, value: &Value) {
        if let Some(filter) = value.get("status_filter").and_then(|v| v.as_str()) {
            config.status_filter = Some(filter.to_string());
        }
        if let Some(page) = value.get("page").and_then(|v| v.as_integer()) {
            config.page = u32::try_from(page).ok();
        }
        if let Some(tick) = value.get("tick_interval_ms").and_then(|v| v.as_integer()) {
            config.tick_interval_ms = u64::try_from(tick).ok();
        }
        if let Some(email) = value.get("admin_email").and_then(|v| v.as_str()) {
            config.admin_email = Some(email.to_string());
        }
        if let Some(groups) = value.get("active_group_ids").and_then(|v| v.as_array()) {
            config.active_group_ids = Some(groups.iter().filter_map(|g| g.as_integer()).collect());
        }
        if let Some(url) = value.get("api_base_url").and_then(|v| v.as_str()) {
            config.api_base_url = Some(url.to_string());
        }
        if let Some(timeout) = value.get("request_timeout_ms").and_then(|v| v.as_integer()) {
            config.request_timeout_ms = u64::try_from(timeout).ok();
        }
        if let Some(path) = value.get("snapshot_path").and_then(|v| v.as_str()) {
            config.snapshot_path = Some(path.to_string());
        }
    }
}
