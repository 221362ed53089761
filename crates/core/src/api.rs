//! JSON response envelope and pagination shared by both HTTP binaries.
//!
//! Every response body has the shape `{"success": true, "data": ...}` or
//! `{"success": false, "error": "...", "details": ...}`. List endpoints add
//! a `pagination` object next to `data`.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not send `limit`.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
            error: None,
            details: None,
        }
    }

    /// A successful page of results.
    pub const fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: Some(pagination),
            error: None,
            details: None,
        }
    }

    /// Attach a human-readable message to a successful response.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// A successful response with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            pagination: None,
            error: None,
            details: None,
        }
    }

    /// A failed response.
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            pagination: None,
            error: Some(error.into()),
            details: None,
        }
    }

    /// A failed response with structured details (e.g. field errors).
    pub fn error_with_details(error: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..Self::error(error)
        }
    }
}

/// `?page=&limit=` query parameters.
///
/// Missing or out-of-range values are clamped rather than rejected: page is
/// at least 1 and limit is between 1 and [`MAX_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    #[must_use]
    pub fn page(self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn limit(self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn offset(self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// SQL `LIMIT` as the `i64` `PostgreSQL` expects.
    #[must_use]
    pub fn sql_limit(self) -> i64 {
        i64::from(self.limit())
    }

    /// SQL `OFFSET` as the `i64` `PostgreSQL` expects.
    #[must_use]
    pub fn sql_offset(self) -> i64 {
        i64::from(self.offset())
    }

    /// Build the response metadata once the total row count is known.
    #[must_use]
    pub fn with_total(self, total: i64) -> Pagination {
        let limit = self.limit();
        let total = u64::try_from(total).unwrap_or(0);
        Pagination {
            page: self.page(),
            limit,
            offset: self.offset(),
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        }
    }
}

/// Pagination metadata returned with list responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
    pub total_pages: u64,
}
