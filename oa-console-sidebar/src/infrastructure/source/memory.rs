use std::sync::RwLock;

use async_trait::async_trait;
use oa_console_core::{ConsoleError, ConsoleResult};

use crate::domain::model::ConversationSummary;
use crate::domain::repository::{SidebarQuery, SidebarSource};

const DEFAULT_PAGE_SIZE: usize = 50;

/// 内存数据源：未配置后端地址时使用，也用于回放与测试
pub struct InMemorySidebarSource {
    rows: RwLock<Vec<ConversationSummary>>,
    page_size: usize,
}

impl Default for InMemorySidebarSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemorySidebarSource {
    pub fn new(rows: Vec<ConversationSummary>) -> Self {
        Self {
            rows: RwLock::new(rows),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 替换后端数据
    pub fn set_rows(&self, rows: Vec<ConversationSummary>) -> ConsoleResult<()> {
        let mut guard = self
            .rows
            .write()
            .map_err(|_| ConsoleError::Refresh("sidebar rows lock poisoned".to_string()))?;
        *guard = rows;
        Ok(())
    }
}

#[async_trait]
impl SidebarSource for InMemorySidebarSource {
    async fn fetch_page(&self, query: &SidebarQuery) -> ConsoleResult<Vec<ConversationSummary>> {
        let guard = self
            .rows
            .read()
            .map_err(|_| ConsoleError::Refresh("sidebar rows lock poisoned".to_string()))?;
        let skip = (query.page.max(1) as usize - 1) * self.page_size;
        Ok(guard
            .iter()
            .filter(|row| query.filter.admits(row.status))
            .skip(skip)
            .take(self.page_size)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        ConversationKey, ConversationStatus, MessagePreview, StatusFilter,
    };

    fn row(user: &str, status: ConversationStatus) -> ConversationSummary {
        ConversationSummary {
            key: ConversationKey::new(user, "1"),
            status,
            unread_count: 0,
            unread_since_epoch_seconds: None,
            last_message: MessagePreview::default(),
            tags: Vec::new(),
            display_name: user.into(),
            picture_url: None,
            oa_name: None,
            read_by: None,
            is_active: false,
        }
    }

    #[tokio::test]
    async fn test_filter_and_paging() {
        let source = InMemorySidebarSource::new(vec![
            row("A", ConversationStatus::Read),
            row("B", ConversationStatus::Issue),
            row("C", ConversationStatus::Read),
            row("D", ConversationStatus::Read),
        ])
        .with_page_size(2);

        let query = |filter, page| SidebarQuery {
            filter,
            page,
            group_ids: Vec::new(),
        };

        let page1 = source.fetch_page(&query(StatusFilter::All, 1)).await.unwrap();
        assert_eq!(page1.len(), 2);
        let page2 = source.fetch_page(&query(StatusFilter::All, 2)).await.unwrap();
        assert_eq!(page2[0].key.user_id, "C");

        let issue = source
            .fetch_page(&query(StatusFilter::Only(ConversationStatus::Issue), 1))
            .await
            .unwrap();
        assert_eq!(issue.len(), 1);

        source.set_rows(Vec::new()).unwrap();
        assert!(source.fetch_page(&query(StatusFilter::All, 1)).await.unwrap().is_empty());
    }
}
