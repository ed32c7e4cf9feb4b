//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod content;
pub mod forum;
pub mod pagination;
pub mod validation;

pub use content::{validate_description, CategoryName, PostContent, ThreadTitle, DEFAULT_MAX_CONTENT_LEN};
pub use forum::{
    Actor, Category, ContextEntry, ContextType, LikeOutcome, LikeSubject, Post, PostWithChildren,
    Role, Thread,
};
pub use pagination::{Paginated, Pagination, PaginationMeta, PaginationParams, DEFAULT_LIMIT, MAX_LIMIT};
pub use validation::ValidationError;
