//! forumctl-core: threaded discussion engine domain
//!
//! Pure, I/O-free building blocks shared by every store and transport:
//! validated models, the error taxonomy and response envelopes, the
//! permission guard, thread ranking, search merging and the tree
//! materializer.

pub mod envelope;
pub mod error;
pub mod models;
pub mod permissions;
pub mod ranking;
pub mod search;
pub mod tree;

pub use envelope::{Envelope, ErrorEnvelope};
pub use error::{ErrorKind, ForumError, ForumResult};
pub use permissions::{authorize, Action};
pub use ranking::{DecayingEngagement, HotScore, ThreadSort};
pub use search::{SearchKind, SearchQuery, SearchResult, SearchScope};
pub use tree::{PostNode, DEFAULT_RENDER_DEPTH};
