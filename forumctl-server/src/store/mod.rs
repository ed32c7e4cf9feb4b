//! Post store - durable keyed access to categories, threads, posts and likes
//!
//! Every implementation upholds the same guarantees:
//! - Counter changes happen inside the store, atomically with the row
//!   change they summarize (no read-modify-write in the caller)
//! - `insert_post` and `delete_post` apply the post row and every counter
//!   it affects as one unit, or nothing at all
//! - A duplicate like insert is "already liked", never an error
//!
//! Two implementations: [`postgres::PgPostStore`] (sqlx, transactions) and
//! [`memory::MemoryPostStore`] (single lock, used by tests and demos).

pub mod memory;
pub mod migrations;
pub mod postgres;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forumctl_core::models::{
    Category, LikeOutcome, LikeSubject, Paginated, Pagination, Post, PostWithChildren, Thread,
    ValidationError,
};
use forumctl_core::{ForumError, SearchQuery, SearchResult, SearchScope, ThreadSort};
use uuid::Uuid;

pub use memory::MemoryPostStore;
pub use postgres::PgPostStore;

/// Storage error, translated into [`ForumError`] at the engine boundary
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[source] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// Unique, foreign-key, not-null or check violation
    #[error("constraint '{constraint}' violated: {message}")]
    Constraint { constraint: String, message: String },

    /// Row-level policy or grant rejection
    #[error("insufficient privilege: {0}")]
    PermissionDenied(String),

    #[error("store call timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Deletion refused because the post still has replies
    #[error("post '{0}' still has replies")]
    HasChildren(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// SQLSTATE for insufficient_privilege
const INSUFFICIENT_PRIVILEGE: &str = "42501";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        let Some(db) = err.as_database_error() else {
            return Self::Sqlx(err);
        };

        if db.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) {
            return Self::PermissionDenied(db.message().to_owned());
        }

        let fallback = match db.kind() {
            ErrorKind::UniqueViolation => "unique_violation",
            ErrorKind::ForeignKeyViolation => "foreign_key_violation",
            ErrorKind::NotNullViolation => "not_null_violation",
            ErrorKind::CheckViolation => "check_violation",
            _ => return Self::Sqlx(err),
        };

        Self::Constraint {
            constraint: db.constraint().unwrap_or(fallback).to_owned(),
            message: db.message().to_owned(),
        }
    }
}

impl From<StoreError> for ForumError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => ForumError::NotFound { resource, id },
            StoreError::HasChildren(id) => ForumError::forbidden(format!(
                "post '{}' has replies and cannot be deleted",
                id
            )),
            StoreError::Constraint {
                constraint,
                message,
            } => ForumError::Database {
                constraint: Some(constraint),
                message,
            },
            StoreError::PermissionDenied(message) => ForumError::Database {
                constraint: Some("insufficient_privilege".to_owned()),
                message,
            },
            StoreError::Timeout { millis } => ForumError::Database {
                constraint: None,
                message: format!("timed out after {}ms", millis),
            },
            StoreError::Sqlx(e) => ForumError::Database {
                constraint: None,
                message: e.to_string(),
            },
        }
    }
}

/// What happens to replies when their parent post is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Remove the whole subtree and decrement counters by its size
    #[default]
    Cascade,
    /// Refuse while the post has replies
    Reject,
}

impl FromStr for DeletePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cascade" => Ok(Self::Cascade),
            "reject" => Ok(Self::Reject),
            other => Err(ValidationError::InvalidVariant {
                field: "delete policy",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cascade => "cascade",
            Self::Reject => "reject",
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewThread {
    pub category_id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
}

/// Post insert with its depth already computed from the parent
#[derive(Debug, Clone)]
pub struct NewPost {
    pub thread_id: Uuid,
    pub parent_post_id: Option<Uuid>,
    pub depth: i32,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Depth-bounded fetch below an optional parent
#[derive(Debug, Clone, Copy)]
pub struct DepthQuery {
    pub thread_id: Uuid,
    /// `None` starts from the thread's root posts
    pub parent_id: Option<Uuid>,
    /// Levels below the starting point
    pub max_depth: u32,
    pub limit: u32,
}

/// Raw rows behind a post-context response
#[derive(Debug, Clone)]
pub struct ContextRows {
    pub target: Post,
    pub ancestors: Vec<Post>,
    pub siblings: Vec<Post>,
}

/// Sibling rows returned with a post context
pub const CONTEXT_SIBLING_LIMIT: i64 = 50;

/// Result of a post deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedPosts {
    pub thread_id: Uuid,
    /// Posts removed, the target included
    pub removed: u64,
}

#[async_trait]
pub trait PostStore: Send + Sync + 'static {
    async fn create_category(&self, new: NewCategory) -> StoreResult<Category>;

    async fn get_category(&self, id: Uuid) -> StoreResult<Category>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    async fn create_thread(&self, new: NewThread) -> StoreResult<Thread>;

    async fn get_thread(&self, id: Uuid) -> StoreResult<Thread>;

    async fn list_threads(
        &self,
        category_id: Option<Uuid>,
        sort: ThreadSort,
        page: Pagination,
    ) -> StoreResult<Paginated<Thread>>;

    /// Update pin/lock flags; `None` leaves a flag untouched.
    async fn set_thread_flags(
        &self,
        id: Uuid,
        pinned: Option<bool>,
        locked: Option<bool>,
    ) -> StoreResult<Thread>;

    /// Remove a thread with its posts and likes.
    async fn delete_thread(&self, id: Uuid) -> StoreResult<()>;

    /// Atomic `views_count + 1`, returning the new count.
    async fn increment_thread_views(&self, id: Uuid) -> StoreResult<i64>;

    async fn get_post(&self, id: Uuid) -> StoreResult<Post>;

    /// Insert a post and bump the thread's and the parent's counters as one unit.
    async fn insert_post(&self, new: NewPost) -> StoreResult<Post>;

    /// Delete a post and decrement counters symmetrically with insertion.
    async fn delete_post(&self, id: Uuid, policy: DeletePolicy) -> StoreResult<DeletedPosts>;

    /// Flip the (subject, user) like row and adjust the cached count.
    async fn toggle_like(
        &self,
        subject: LikeSubject,
        subject_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<LikeOutcome>;

    /// Flat batch ordered by depth then creation time, so truncation keeps
    /// the upper levels.
    async fn thread_posts(&self, thread_id: Uuid, limit: u32) -> StoreResult<Vec<Post>>;

    /// The parent (when given) and its descendants within `max_depth` levels.
    async fn posts_by_depth(&self, query: DepthQuery) -> StoreResult<Vec<PostWithChildren>>;

    async fn post_context(&self, post_id: Uuid) -> StoreResult<ContextRows>;

    /// Per-type hits ranked by relevance, at most `limit` of each type.
    async fn search(
        &self,
        query: &SearchQuery,
        scope: SearchScope,
        category_id: Option<Uuid>,
        limit: u32,
    ) -> StoreResult<Vec<SearchResult>>;
}
