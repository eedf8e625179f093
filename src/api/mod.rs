// src/api/mod.rs

// API module (ApiMgr): validates raw request parameters and hands the typed
// values to the query processor. Nothing reaches the store until validation
// has passed.
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ServiceError;
use crate::query_processor::{self, DeleteOutcome, Page, Pagination, USER_NOT_FOUND};
use crate::storage::{Record, Store};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_USERS_LIMIT: u32 = 10;
pub const DEFAULT_POSTS_LIMIT: u32 = 4;

pub const INVALID_PAGINATION: &str = "Invalid pagination params";
pub const INVALID_USER_ID: &str = "Invalid user ID";
pub const INVALID_PARAMETERS: &str = "Invalid parameters";
pub const INVALID_POST_ID: &str = "Invalid post ID";

/// Raw pagination query string. Values stay strings until validated.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PaginationQuery {
    pub fn new(page: Option<&str>, limit: Option<&str>) -> Self {
        PaginationQuery {
            page: page.map(str::to_owned),
            limit: limit.map(str::to_owned),
        }
    }

    /// Applies defaults for absent values; present values must be whole
    /// numbers `>= 1`.
    pub fn validate(&self, default_limit: u32) -> Option<Pagination> {
        let page = parse_count(self.page.as_deref(), DEFAULT_PAGE)?;
        let limit = parse_count(self.limit.as_deref(), default_limit)?;
        Pagination::new(page, limit)
    }
}

fn parse_count(raw: Option<&str>, default: u32) -> Option<u32> {
    match raw {
        None => Some(default),
        Some(raw) if is_digits(raw) => raw.parse().ok(),
        Some(_) => None,
    }
}

/// Matches `^\d+$` (ASCII digits only).
fn is_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// A path id that passed `^\d+$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowId {
    Key(i64),
    /// Well-formed but past `i64::MAX`; no SQLite row can carry it.
    OutOfRange,
}

/// Parses an id path segment. `None` means the segment is malformed.
pub fn parse_id(raw: &str) -> Option<RowId> {
    if !is_digits(raw) {
        return None;
    }
    Some(raw.parse::<i64>().map_or(RowId::OutOfRange, RowId::Key))
}

pub struct ApiMgr {
    store: Arc<dyn Store>,
}

impl ApiMgr {
    pub fn new(store: Arc<dyn Store>) -> Self {
        ApiMgr { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn list_users(&self, query: &PaginationQuery) -> Result<Page<Record>, ServiceError> {
        let pagination = query
            .validate(DEFAULT_USERS_LIMIT)
            .ok_or_else(|| ServiceError::validation(INVALID_PAGINATION))?;
        Ok(query_processor::list_users(self.store(), pagination)?)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Record, ServiceError> {
        match parse_id(user_id) {
            Some(RowId::Key(user_id)) => query_processor::get_user(self.store(), user_id),
            Some(RowId::OutOfRange) => Err(ServiceError::NotFound(USER_NOT_FOUND.to_string())),
            None => Err(ServiceError::validation(INVALID_USER_ID)),
        }
    }

    pub fn list_posts(
        &self,
        user_id: &str,
        query: &PaginationQuery,
    ) -> Result<Page<Record>, ServiceError> {
        let user_id = parse_id(user_id);
        let pagination = query.validate(DEFAULT_POSTS_LIMIT);
        let (Some(user_id), Some(pagination)) = (user_id, pagination) else {
            return Err(ServiceError::validation(INVALID_PARAMETERS));
        };
        match user_id {
            RowId::Key(user_id) => {
                Ok(query_processor::list_posts(self.store(), user_id, pagination)?)
            }
            RowId::OutOfRange => Ok(pagination.empty_page()),
        }
    }

    pub fn delete_post(&self, post_id: &str) -> Result<DeleteOutcome, ServiceError> {
        match parse_id(post_id) {
            Some(RowId::Key(post_id)) => Ok(query_processor::delete_post(self.store(), post_id)?),
            Some(RowId::OutOfRange) => Ok(DeleteOutcome { deleted: false }),
            None => Err(ServiceError::validation(INVALID_POST_ID)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let p = PaginationQuery::default().validate(DEFAULT_USERS_LIMIT).unwrap();
        assert_eq!((p.page(), p.limit()), (1, 10));

        let p = PaginationQuery::new(Some("3"), None)
            .validate(DEFAULT_POSTS_LIMIT)
            .unwrap();
        assert_eq!((p.page(), p.limit()), (3, 4));
    }

    #[test]
    fn test_pagination_rejects_bad_values() {
        for (page, limit) in [
            (Some("0"), None),
            (None, Some("0")),
            (Some("-1"), None),
            (Some("1.5"), None),
            (Some("abc"), None),
            (Some(""), None),
            (Some("+2"), None),
            (None, Some(" 5")),
            (None, Some("99999999999")),
        ] {
            assert!(
                PaginationQuery::new(page, limit).validate(10).is_none(),
                "page={page:?} limit={limit:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), Some(RowId::Key(42)));
        assert_eq!(parse_id("007"), Some(RowId::Key(7)));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id("-1"), None);
        assert_eq!(parse_id("1e3"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("9223372036854775807"), Some(RowId::Key(i64::MAX)));
        assert_eq!(parse_id("9223372036854775808"), Some(RowId::OutOfRange));
        assert_eq!(parse_id("99999999999999999999"), Some(RowId::OutOfRange));
    }

    #[test]
    fn test_out_of_range_ids_resolve_without_store() {
        let store = crate::storage::SqliteStore::open_in_memory().unwrap();
        // No schema: any store call would fail.
        let api = ApiMgr::new(Arc::new(store));
        let huge = "99999999999999999999";

        assert!(matches!(api.get_user(huge), Err(ServiceError::NotFound(_))));
        let page = api.list_posts(huge, &PaginationQuery::default()).unwrap();
        assert!(page.data.is_empty());
        assert_eq!((page.total, page.total_pages, page.limit), (0, 0, 4));
        assert!(!api.delete_post(huge).unwrap().deleted);
    }
}
