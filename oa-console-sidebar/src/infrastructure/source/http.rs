use std::time::Duration;

use async_trait::async_trait;
use oa_console_core::{ConsoleError, ConsoleResult};
use reqwest::Client;
use tracing::{debug, warn};

use crate::domain::model::{ConversationSummary, ConversationUpdatePayload};
use crate::domain::repository::{SidebarQuery, SidebarSource};

/// 侧边栏列表接口路径（相对 api_base_url）
const CONVERSATIONS_PATH: &str = "/chats/api/conversations";

/// 通过 REST 接口拉取侧边栏整页数据
///
/// 每一行与 `conversation_update` 负载同构；无法解析的行跳过，不影响整页。
#[derive(Clone)]
pub struct HttpSidebarSource {
    client: Client,
    endpoint: String,
}

impl HttpSidebarSource {
    pub fn new(base_url: &str, timeout: Duration) -> ConsoleResult<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|err| ConsoleError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), CONVERSATIONS_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SidebarSource for HttpSidebarSource {
    async fn fetch_page(&self, query: &SidebarQuery) -> ConsoleResult<Vec<ConversationSummary>> {
        let group_ids = query
            .group_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut params = vec![
            ("status_filter", query.filter.as_str().to_string()),
            ("page", query.page.to_string()),
        ];
        if !group_ids.is_empty() {
            params.push(("group_ids", group_ids));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|err| ConsoleError::Refresh(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConsoleError::Refresh(format!(
                "{} returned {}",
                self.endpoint, status
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|err| ConsoleError::Refresh(format!("invalid sidebar payload: {err}")))?;

        let total = rows.len();
        let summaries = rows_to_summaries(rows);
        debug!(
            endpoint = %self.endpoint,
            rows = total,
            accepted = summaries.len(),
            "Fetched sidebar page"
        );
        Ok(summaries)
    }
}

/// 将接口行转换为会话条目
pub(crate) fn rows_to_summaries(rows: Vec<serde_json::Value>) -> Vec<ConversationSummary> {
    rows.into_iter()
        .filter_map(|row| {
            let decoded = serde_json::from_value::<ConversationUpdatePayload>(row)
                .map_err(ConsoleError::from)
                .and_then(ConversationUpdatePayload::into_update);
            match decoded {
                Ok(update) => Some(ConversationSummary::from_update(&update)),
                Err(err) => {
                    warn!(error = %err, "Skipping malformed sidebar row");
                    None
                }
            }
        })
        .collect()
}
