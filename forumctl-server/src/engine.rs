//! Mutation engine and read service
//!
//! Every entry point validates input and runs the permission guard before
//! any write reaches the store, computes reply depth from the parent, and
//! bounds each store call with the configured timeout. Counter maintenance
//! itself lives in the store, atomically with the row change.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use forumctl_core::models::{
    validate_description, Actor, Category, CategoryName, ContextEntry, LikeOutcome, LikeSubject,
    Paginated, Pagination, Post, PostContent, PostWithChildren, Thread, ThreadTitle,
};
use forumctl_core::search::merge_results;
use forumctl_core::tree::{self, PostNode};
use forumctl_core::{
    authorize, Action, ForumError, ForumResult, SearchKind, SearchQuery, SearchResult, SearchScope,
    ThreadSort,
};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::store::{
    DepthQuery, NewCategory, NewPost, NewThread, PostStore, StoreError, StoreResult,
};

/// Posts returned by a hierarchical fetch when the caller gives no limit
pub const DEFAULT_BATCH_LIMIT: u32 = 200;

/// Upper bound for flat and depth-bounded post batches
pub const MAX_BATCH_LIMIT: u32 = 1_000;

/// Search offsets past this are clamped to it
pub const MAX_SEARCH_OFFSET: u32 = 10_000;

/// Page size and offset of a search, both bounded.
fn search_window(limit: Option<u32>, offset: Option<u32>, max_page_size: u32) -> (u32, u32) {
    let limit = limit
        .unwrap_or(forumctl_core::models::DEFAULT_LIMIT)
        .clamp(1, max_page_size);
    (limit, offset.unwrap_or(0).min(MAX_SEARCH_OFFSET))
}

#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateThread {
    pub category_id: Uuid,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CreatePost {
    pub thread_id: Uuid,
    pub parent_post_id: Option<Uuid>,
    pub content: String,
}

/// Search request as received from a caller
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub scope: SearchScope,
    pub category_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub struct ForumEngine {
    store: Arc<dyn PostStore>,
    config: EngineConfig,
}

impl ForumEngine {
    pub fn new(store: Arc<dyn PostStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a store call under the configured deadline.
    async fn call<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> ForumResult<T> {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result.map_err(ForumError::from),
            Err(_) => Err(StoreError::Timeout {
                millis: self.config.store_timeout.as_millis() as u64,
            }
            .into()),
        }
    }

    fn clamp_batch(&self, limit: Option<u32>) -> u32 {
        limit.unwrap_or(DEFAULT_BATCH_LIMIT).clamp(1, MAX_BATCH_LIMIT)
    }

    fn clamp_depth(&self, max_depth: Option<u32>) -> u32 {
        max_depth.unwrap_or(self.config.render_depth).clamp(1, 64)
    }

    // -- categories -------------------------------------------------------

    pub async fn create_category(
        &self,
        actor: Option<&Actor>,
        input: CreateCategory,
    ) -> ForumResult<Category> {
        authorize(actor, Action::Moderate, Utc::now())?;
        let name = CategoryName::new(&input.name)?;
        let description = validate_description(input.description.as_deref().unwrap_or_default())?;

        let category = self
            .call(self.store.create_category(NewCategory {
                name: name.as_str().to_owned(),
                description,
                color: input.color,
                icon: input.icon,
            }))
            .await?;
        tracing::info!(category_id = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> ForumResult<Vec<Category>> {
        self.call(self.store.list_categories()).await
    }

    pub async fn get_category(&self, id: Uuid) -> ForumResult<Category> {
        self.call(self.store.get_category(id)).await
    }

    // -- threads ----------------------------------------------------------

    pub async fn create_thread(
        &self,
        actor: Option<&Actor>,
        input: CreateThread,
    ) -> ForumResult<Thread> {
        authorize(actor, Action::CreateThread, Utc::now())?;
        let author = actor.ok_or(ForumError::Unauthenticated)?;
        let title = ThreadTitle::new(&input.title)?;
        let content = PostContent::new(&input.content, self.config.max_post_length)?;

        let thread = self
            .call(self.store.create_thread(NewThread {
                category_id: input.category_id,
                title: title.into_string(),
                content: content.into_string(),
                author_id: author.user_id,
            }))
            .await?;
        tracing::info!(thread_id = %thread.id, category_id = %thread.category_id, "thread created");
        Ok(thread)
    }

    /// Fetch a thread, counting the view.
    pub async fn get_thread(&self, id: Uuid) -> ForumResult<Thread> {
        let views = self.call(self.store.increment_thread_views(id)).await?;
        let mut thread = self.call(self.store.get_thread(id)).await?;
        // a concurrent view may already be reflected; never report fewer
        thread.views_count = thread.views_count.max(views);
        Ok(thread)
    }

    pub async fn list_threads(
        &self,
        category_id: Option<Uuid>,
        sort: ThreadSort,
        page: Pagination,
    ) -> ForumResult<Paginated<Thread>> {
        let page = Pagination::new(page.page, page.limit.min(self.config.max_page_size));
        self.call(self.store.list_threads(category_id, sort, page)).await
    }

    pub async fn delete_thread(&self, actor: Option<&Actor>, id: Uuid) -> ForumResult<()> {
        let thread = self.call(self.store.get_thread(id)).await?;
        authorize(actor, Action::DeleteThread { thread: &thread }, Utc::now())?;

        self.call(self.store.delete_thread(id)).await?;
        tracing::info!(thread_id = %id, replies = thread.replies_count, "thread deleted");
        Ok(())
    }

    pub async fn set_pinned(&self, actor: Option<&Actor>, id: Uuid, pinned: bool) -> ForumResult<Thread> {
        authorize(actor, Action::Moderate, Utc::now())?;
        let thread = self.call(self.store.set_thread_flags(id, Some(pinned), None)).await?;
        tracing::info!(thread_id = %id, pinned, "thread pin changed");
        Ok(thread)
    }

    pub async fn set_locked(&self, actor: Option<&Actor>, id: Uuid, locked: bool) -> ForumResult<Thread> {
        authorize(actor, Action::Moderate, Utc::now())?;
        let thread = self.call(self.store.set_thread_flags(id, None, Some(locked))).await?;
        tracing::info!(thread_id = %id, locked, "thread lock changed");
        Ok(thread)
    }

    // -- posts ------------------------------------------------------------

    pub async fn get_post(&self, id: Uuid) -> ForumResult<Post> {
        self.call(self.store.get_post(id)).await
    }

    /// Create a root reply or a nested reply under `parent_post_id`.
    pub async fn create_post(&self, actor: Option<&Actor>, input: CreatePost) -> ForumResult<Post> {
        let content = PostContent::new(&input.content, self.config.max_post_length)?;
        let thread = self.call(self.store.get_thread(input.thread_id)).await?;
        authorize(actor, Action::Reply { thread: &thread }, Utc::now())?;
        let author = actor.ok_or(ForumError::Unauthenticated)?;

        let depth = match input.parent_post_id {
            None => 0,
            Some(parent_id) => {
                let parent = self.parent_in_thread(thread.id, parent_id).await?;
                parent.depth + 1
            }
        };

        let post = self
            .call(self.store.insert_post(NewPost {
                thread_id: thread.id,
                parent_post_id: input.parent_post_id,
                depth,
                author_id: author.user_id,
                content: content.into_string(),
                created_at: Utc::now(),
            }))
            .await?;
        tracing::info!(
            thread_id = %post.thread_id,
            post_id = %post.id,
            depth = post.depth,
            "reply created"
        );
        Ok(post)
    }

    /// Parent lookup scoped to one thread; a post elsewhere is "not found".
    async fn parent_in_thread(&self, thread_id: Uuid, parent_id: Uuid) -> ForumResult<Post> {
        match self.call(self.store.get_post(parent_id)).await {
            Ok(parent) if parent.thread_id == thread_id => Ok(parent),
            Ok(_) | Err(ForumError::NotFound { .. }) => Err(ForumError::not_found("post", parent_id)),
            Err(e) => Err(e),
        }
    }

    /// Delete a post under the configured reply policy; returns posts removed.
    pub async fn delete_post(&self, actor: Option<&Actor>, id: Uuid) -> ForumResult<u64> {
        let post = self.call(self.store.get_post(id)).await?;
        authorize(actor, Action::DeletePost { post: &post }, Utc::now())?;

        let deleted = self
            .call(self.store.delete_post(id, self.config.delete_policy))
            .await?;
        tracing::info!(
            thread_id = %deleted.thread_id,
            post_id = %id,
            removed = deleted.removed,
            policy = %self.config.delete_policy,
            "post deleted"
        );
        Ok(deleted.removed)
    }

    pub async fn toggle_thread_like(&self, actor: Option<&Actor>, thread_id: Uuid) -> ForumResult<LikeOutcome> {
        let thread = self.call(self.store.get_thread(thread_id)).await?;
        self.toggle_like(actor, &thread, LikeSubject::Thread, thread_id).await
    }

    pub async fn toggle_post_like(&self, actor: Option<&Actor>, post_id: Uuid) -> ForumResult<LikeOutcome> {
        let post = self.call(self.store.get_post(post_id)).await?;
        let thread = self.call(self.store.get_thread(post.thread_id)).await?;
        self.toggle_like(actor, &thread, LikeSubject::Post, post_id).await
    }

    async fn toggle_like(
        &self,
        actor: Option<&Actor>,
        thread: &Thread,
        subject: LikeSubject,
        subject_id: Uuid,
    ) -> ForumResult<LikeOutcome> {
        authorize(actor, Action::Like { thread }, Utc::now())?;
        let user = actor.ok_or(ForumError::Unauthenticated)?;

        let outcome = self
            .call(self.store.toggle_like(subject, subject_id, user.user_id))
            .await?;
        tracing::info!(
            thread_id = %thread.id,
            subject = subject.as_str(),
            subject_id = %subject_id,
            liked = outcome.liked,
            likes = outcome.likes_count,
            "like toggled"
        );
        Ok(outcome)
    }

    // -- reads ------------------------------------------------------------

    /// Flat, depth-tagged batch for client-side tree building.
    pub async fn thread_posts_hierarchical(
        &self,
        thread_id: Uuid,
        limit: Option<u32>,
    ) -> ForumResult<Vec<Post>> {
        self.call(self.store.get_thread(thread_id)).await?;
        self.call(self.store.thread_posts(thread_id, self.clamp_batch(limit)))
            .await
    }

    /// Posts within `max_depth` levels below `parent_id` (or the thread roots).
    pub async fn posts_by_depth(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        max_depth: Option<u32>,
        limit: Option<u32>,
    ) -> ForumResult<Vec<PostWithChildren>> {
        self.call(self.store.get_thread(thread_id)).await?;
        if let Some(parent_id) = parent_id {
            self.parent_in_thread(thread_id, parent_id).await?;
        }

        self.call(self.store.posts_by_depth(DepthQuery {
            thread_id,
            parent_id,
            max_depth: self.clamp_depth(max_depth),
            limit: self.clamp_batch(limit),
        }))
        .await
    }

    /// Server-built tree: roots with `max_depth` levels and continue markers.
    pub async fn thread_tree(
        &self,
        thread_id: Uuid,
        max_depth: Option<u32>,
        expanded: &HashSet<Uuid>,
    ) -> ForumResult<Vec<PostNode>> {
        let max_depth = self.clamp_depth(max_depth);
        let batch: Vec<Post> = self
            .posts_by_depth(thread_id, None, Some(max_depth), Some(MAX_BATCH_LIMIT))
            .await?
            .into_iter()
            .map(|p| p.post)
            .collect();
        Ok(tree::materialize(&batch, expanded, max_depth))
    }

    /// Ancestors root-first, the post itself, then its siblings.
    pub async fn post_context(&self, post_id: Uuid) -> ForumResult<Vec<ContextEntry>> {
        let rows = self.call(self.store.post_context(post_id)).await?;
        Ok(tree::post_context(rows.target, rows.ancestors, rows.siblings))
    }

    pub async fn search(&self, request: SearchRequest) -> ForumResult<Vec<SearchResult>> {
        let query = SearchQuery::new(&request.query)?;
        let (limit, offset) = search_window(request.limit, request.offset, self.config.max_page_size);

        // each type may fill the whole window on its own
        let fetch = limit.saturating_add(offset);
        let hits = self
            .call(self.store.search(&query, request.scope, request.category_id, fetch))
            .await?;
        let (threads, posts): (Vec<_>, Vec<_>) =
            hits.into_iter().partition(|hit| hit.kind == SearchKind::Thread);

        Ok(merge_results(threads, posts, limit as usize, offset as usize))
    }
}
