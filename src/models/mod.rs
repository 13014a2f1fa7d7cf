pub mod chat;
pub mod message;

use serde::{Deserialize, Serialize};

pub use chat::{Chat, ChatListRow, ChatSide};
pub use message::Message;

/// Verified identity returned by the user service's USER_AUTH call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Identity {
    /// Name used in join/leave notices, capitalized; falls back to the
    /// user id when the identity service returned no name.
    pub fn display_name(&self) -> String {
        match self.first_name.as_deref() {
            Some(name) if !name.is_empty() => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => self.user_id.clone(),
                }
            }
            _ => self.user_id.clone(),
        }
    }
}

/// 1-based page request; out-of-range values are clamped by the store.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        let page = self.page.max(1) as u64;
        (page - 1) * self.limit as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        let limit = pagination.limit.max(1);
        let pages = total.div_ceil(limit as u64) as u32;
        Self {
            docs,
            total,
            page: pagination.page.max(1),
            limit: pagination.limit,
            pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            docs: self.docs.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: self.pages,
        }
    }
}
