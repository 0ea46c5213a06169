//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建数据源、快照存储、领域服务与处理器

use std::sync::Arc;

use anyhow::{Context, Result};
use oa_console_core::config::ConsoleAppConfig;
use oa_console_core::utils::{Clock, SystemClock};
use tokio::sync::Mutex;
use tracing::info;

use crate::application::handlers::SidebarCommandHandler;
use crate::application::queries::SidebarQueryHandler;
use crate::config::SidebarConfig;
use crate::domain::repository::{Notifier, SidebarSource, TimerSnapshotStore};
use crate::domain::service::{SidebarDomainConfig, SidebarDomainService};
use crate::infrastructure::notification::TracingNotifier;
use crate::infrastructure::persistence::{FileTimerSnapshotStore, InMemoryTimerSnapshotStore};
use crate::infrastructure::source::{HttpSidebarSource, InMemorySidebarSource};

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub config: Arc<SidebarConfig>,
    pub command_handler: SidebarCommandHandler,
    pub query_handler: SidebarQueryHandler,
}

/// 可替换的外部依赖
pub struct ContextParts {
    pub clock: Arc<dyn Clock>,
    pub source: Arc<dyn SidebarSource>,
    pub snapshot_store: Arc<dyn TimerSnapshotStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// 构建应用上下文
pub async fn initialize(app_config: &ConsoleAppConfig) -> Result<ApplicationContext> {
    // 1. 加载侧边栏配置
    let config = SidebarConfig::from_app_config(app_config)
        .context("Failed to load sidebar service configuration")?;

    // 2. 侧边栏数据源
    let source: Arc<dyn SidebarSource> = match &config.api_base_url {
        Some(base_url) => {
            let source = HttpSidebarSource::new(base_url, config.request_timeout)
                .context("Failed to build sidebar HTTP client")?;
            info!(endpoint = %source.endpoint(), "Using HTTP sidebar source");
            Arc::new(source)
        }
        None => {
            info!("api_base_url not configured, using in-memory sidebar source");
            Arc::new(InMemorySidebarSource::default())
        }
    };

    // 3. 冻结计时快照存储
    let snapshot_store: Arc<dyn TimerSnapshotStore> = match &config.snapshot_path {
        Some(path) => {
            info!(path = %path.display(), "Using file timer snapshot store");
            Arc::new(FileTimerSnapshotStore::new(path.clone()))
        }
        None => Arc::new(InMemoryTimerSnapshotStore::new()),
    };

    Ok(initialize_with(
        config,
        ContextParts {
            clock: Arc::new(SystemClock),
            source,
            snapshot_store,
            notifier: Arc::new(TracingNotifier),
        },
    ))
}

/// 使用指定依赖构建上下文（回放与测试使用）
pub fn initialize_with(config: SidebarConfig, parts: ContextParts) -> ApplicationContext {
    let domain_config = SidebarDomainConfig {
        status_filter: config.status_filter,
        page: config.page,
        admin_email: config.admin_email.clone(),
        active_group_ids: config.active_group_ids.clone(),
    };

    let domain_service = Arc::new(Mutex::new(SidebarDomainService::new(
        domain_config,
        parts.clock,
        parts.source,
        Some(parts.snapshot_store),
        parts.notifier,
    )));

    ApplicationContext {
        config: Arc::new(config),
        command_handler: SidebarCommandHandler::new(domain_service.clone()),
        query_handler: SidebarQueryHandler::new(domain_service),
    }
}
