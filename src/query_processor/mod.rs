// src/query_processor/mod.rs
//
// Query processing: turns validated inputs into store calls and shapes the
// results into response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::error::ServiceError;
use crate::storage::{Record, Store, StoreResult};

pub const USER_NOT_FOUND: &str = "User not found";

/// A validated 1-based page request. Both fields are always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Returns `None` unless `page >= 1` and `limit >= 1`.
    pub fn new(page: u32, limit: u32) -> Option<Self> {
        if page == 0 || limit == 0 {
            return None;
        }
        Some(Pagination { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `ceil(total / limit)`.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    /// Envelope for a listing known to have no rows.
    pub fn empty_page<T>(&self) -> Page<T> {
        self.envelope(Vec::new(), 0)
    }

    fn envelope<T>(&self, data: Vec<T>, total: u64) -> Page<T> {
        Page {
            data,
            total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages(total),
        }
    }
}

/// Response wrapper shared by every paginated listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
}

/// A user page where every row carries its `address` (or `null`).
pub fn list_users(store: &dyn Store, pagination: Pagination) -> StoreResult<Page<Record>> {
    let total = store.count_users()?;
    let users = store.list_users(pagination.limit(), pagination.offset())?;

    let mut data = Vec::with_capacity(users.len());
    for mut user in users {
        let address = match user.get("id") {
            Some(id) => store.find_address(id)?,
            None => None,
        };
        user.insert(
            "address".to_string(),
            address.map_or(Value::Null, Value::Object),
        );
        data.push(user);
    }

    tracing::debug!(
        page = pagination.page(),
        limit = pagination.limit(),
        total,
        returned = data.len(),
        "Listed users"
    );
    Ok(pagination.envelope(data, total))
}

pub fn get_user(store: &dyn Store, user_id: i64) -> Result<Record, ServiceError> {
    store
        .find_user(user_id)?
        .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.to_string()))
}

/// Posts of one user. An unknown user is an empty page, not an error.
pub fn list_posts(
    store: &dyn Store,
    user_id: i64,
    pagination: Pagination,
) -> StoreResult<Page<Record>> {
    let data = store.list_posts(user_id, pagination.limit(), pagination.offset())?;
    let total = store.count_posts(user_id)?;
    tracing::debug!(user_id, page = pagination.page(), total, "Listed posts");
    Ok(pagination.envelope(data, total))
}

pub fn delete_post(store: &dyn Store, post_id: i64) -> StoreResult<DeleteOutcome> {
    let deleted = store.delete_post(post_id)?;
    tracing::info!(post_id, deleted, "Delete post");
    Ok(DeleteOutcome { deleted })
}
