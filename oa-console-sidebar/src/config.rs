use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use oa_console_core::config::ConsoleAppConfig;

use crate::domain::model::StatusFilter;

#[derive(Clone, Debug)]
pub struct SidebarConfig {
    pub status_filter: StatusFilter,
    pub page: u32,
    pub tick_interval: Duration,
    pub admin_email: Option<String>,
    pub active_group_ids: Vec<i64>,
    pub api_base_url: Option<String>,
    pub request_timeout: Duration,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            status_filter: StatusFilter::All,
            page: 1,
            tick_interval: Duration::from_millis(1000),
            admin_email: None,
            active_group_ids: Vec::new(),
            api_base_url: None,
            request_timeout: Duration::from_millis(10_000),
            snapshot_path: None,
        }
    }
}

impl SidebarConfig {
    /// 从应用配置加载（环境变量优先）
    pub fn from_app_config(app: &ConsoleAppConfig) -> Result<Self> {
        let service_config = app.sidebar_service();
        let defaults = Self::default();

        let status_filter = env::var("OA_SIDEBAR_STATUS_FILTER")
            .ok()
            .or_else(|| service_config.status_filter.clone())
            .map(|raw| {
                raw.parse::<StatusFilter>()
                    .with_context(|| format!("invalid sidebar status filter `{raw}`"))
            })
            .transpose()?
            .unwrap_or(defaults.status_filter);

        let page = env::var("OA_SIDEBAR_PAGE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .or(service_config.page)
            .filter(|p| *p > 0)
            .unwrap_or(defaults.page);

        let tick_interval = env::var("OA_SIDEBAR_TICK_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(service_config.tick_interval_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);

        let admin_email = env::var("OA_SIDEBAR_ADMIN_EMAIL")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| service_config.admin_email.clone());

        let active_group_ids = match env::var("OA_SIDEBAR_ACTIVE_GROUP_IDS") {
            Ok(raw) => parse_group_ids(&raw)?,
            Err(_) => service_config.active_group_ids.clone().unwrap_or_default(),
        };

        let api_base_url = env::var("OA_SIDEBAR_API_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| service_config.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());

        let request_timeout = env::var("OA_SIDEBAR_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(service_config.request_timeout_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);

        let snapshot_path = env::var("OA_SIDEBAR_SNAPSHOT_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| service_config.snapshot_path.clone())
            .map(PathBuf::from);

        Ok(Self {
            status_filter,
            page,
            tick_interval,
            admin_email,
            active_group_ids,
            api_base_url,
            request_timeout,
            snapshot_path,
        })
    }
}

fn parse_group_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("invalid group id `{s}` in OA_SIDEBAR_ACTIVE_GROUP_IDS"))
        })
        .collect()
}
