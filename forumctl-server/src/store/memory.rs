//! In-process post store
//!
//! All state sits behind one async mutex, so every operation (counters
//! included) is applied as a unit. Mirrors the Postgres constraints closely
//! enough that the engine behaves the same on both.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use forumctl_core::models::{
    Category, LikeOutcome, LikeSubject, Paginated, Pagination, Post, PostWithChildren, Thread,
};
use forumctl_core::ranking::sort_threads;
use forumctl_core::search::{compare_results, term_relevance};
use forumctl_core::{
    DecayingEngagement, HotScore, SearchKind, SearchQuery, SearchResult, SearchScope, ThreadSort,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ContextRows, DeletePolicy, DeletedPosts, DepthQuery, NewCategory, NewPost, NewThread,
    PostStore, StoreError, StoreResult, CONTEXT_SIBLING_LIMIT,
};

#[derive(Default)]
struct State {
    categories: HashMap<Uuid, Category>,
    threads: HashMap<Uuid, Thread>,
    posts: HashMap<Uuid, Post>,
    likes: HashSet<(LikeSubject, Uuid, Uuid)>,
}

impl State {
    fn thread_mut(&mut self, id: Uuid) -> StoreResult<&mut Thread> {
        self.threads
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("thread", id))
    }

    fn post(&self, id: Uuid) -> StoreResult<&Post> {
        self.posts
            .get(&id)
            .ok_or_else(|| StoreError::not_found("post", id))
    }

    fn children_of(&self, thread_id: Uuid, parent: Option<Uuid>) -> Vec<&Post> {
        self.posts
            .values()
            .filter(|p| p.thread_id == thread_id && p.parent_post_id == parent)
            .collect()
    }

    /// The post and every descendant, breadth-first.
    fn subtree(&self, root: &Post) -> Vec<Uuid> {
        let mut ids = vec![root.id];
        let mut cursor = 0;
        while cursor < ids.len() {
            let current = ids[cursor];
            ids.extend(
                self.posts
                    .values()
                    .filter(|p| p.parent_post_id == Some(current))
                    .map(|p| p.id),
            );
            cursor += 1;
        }
        ids
    }
}

fn constraint(name: &str, message: &str) -> StoreError {
    StoreError::Constraint {
        constraint: name.to_owned(),
        message: message.to_owned(),
    }
}

pub struct MemoryPostStore {
    state: Mutex<State>,
    hot: Arc<dyn HotScore>,
}

impl MemoryPostStore {
    pub fn new(hot: Arc<dyn HotScore>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            hot,
        }
    }

    fn rescore(&self, thread: &mut Thread) {
        thread.hot_score = self.hot.score(thread, Utc::now());
    }
}

impl Default for MemoryPostStore {
    fn default() -> Self {
        Self::new(Arc::new(DecayingEngagement::default()))
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn create_category(&self, new: NewCategory) -> StoreResult<Category> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == new.name) {
            return Err(constraint(
                "forum_categories_name_key",
                "duplicate key value violates unique constraint",
            ));
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            color: new.color,
            icon: new.icon,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Category> {
        let state = self.state.lock().await;
        state
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("category", id))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_thread(&self, new: NewThread) -> StoreResult<Thread> {
        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&new.category_id) {
            return Err(StoreError::not_found("category", new.category_id));
        }

        let now = Utc::now();
        let mut thread = Thread {
            id: Uuid::new_v4(),
            category_id: new.category_id,
            title: new.title,
            content: new.content,
            author_id: new.author_id,
            is_pinned: false,
            is_locked: false,
            views_count: 0,
            replies_count: 0,
            likes_count: 0,
            hot_score: 0.0,
            last_post_at: None,
            last_post_user_id: None,
            created_at: now,
            updated_at: now,
        };
        self.rescore(&mut thread);
        state.threads.insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, id: Uuid) -> StoreResult<Thread> {
        let state = self.state.lock().await;
        state
            .threads
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("thread", id))
    }

    async fn list_threads(
        &self,
        category_id: Option<Uuid>,
        sort: ThreadSort,
        page: Pagination,
    ) -> StoreResult<Paginated<Thread>> {
        let state = self.state.lock().await;
        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| category_id.map_or(true, |c| t.category_id == c))
            .cloned()
            .collect();
        sort_threads(&mut threads, sort);

        let total = threads.len() as u64;
        let items = threads
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(Paginated { items, total, page })
    }

    async fn set_thread_flags(
        &self,
        id: Uuid,
        pinned: Option<bool>,
        locked: Option<bool>,
    ) -> StoreResult<Thread> {
        let mut state = self.state.lock().await;
        let thread = state.thread_mut(id)?;
        if let Some(pinned) = pinned {
            thread.is_pinned = pinned;
        }
        if let Some(locked) = locked {
            thread.is_locked = locked;
        }
        thread.updated_at = Utc::now();
        Ok(thread.clone())
    }

    async fn delete_thread(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.threads.remove(&id).is_none() {
            return Err(StoreError::not_found("thread", id));
        }

        let removed: HashSet<Uuid> = state
            .posts
            .values()
            .filter(|p| p.thread_id == id)
            .map(|p| p.id)
            .collect();
        state.posts.retain(|_, p| p.thread_id != id);
        state.likes.retain(|(subject, subject_id, _)| match subject {
            LikeSubject::Thread => *subject_id != id,
            LikeSubject::Post => !removed.contains(subject_id),
        });
        Ok(())
    }

    async fn increment_thread_views(&self, id: Uuid) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        let thread = state.thread_mut(id)?;
        thread.views_count += 1;
        let views = thread.views_count;
        self.rescore(thread);
        Ok(views)
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Post> {
        let state = self.state.lock().await;
        state.post(id).cloned()
    }

    async fn insert_post(&self, new: NewPost) -> StoreResult<Post> {
        let mut state = self.state.lock().await;
        if !state.threads.contains_key(&new.thread_id) {
            return Err(StoreError::not_found("thread", new.thread_id));
        }
        if new.parent_post_id.is_none() != (new.depth == 0) {
            return Err(constraint(
                "forum_posts_root_depth",
                "root posts have depth 0, replies deeper",
            ));
        }
        if let Some(parent_id) = new.parent_post_id {
            match state.posts.get(&parent_id) {
                Some(parent) if parent.thread_id == new.thread_id => {}
                _ => {
                    return Err(constraint(
                        "forum_posts_parent_fkey",
                        "parent post is not in this thread",
                    ))
                }
            }
        }

        let post = Post {
            id: Uuid::new_v4(),
            thread_id: new.thread_id,
            content: new.content,
            author_id: new.author_id,
            parent_post_id: new.parent_post_id,
            depth: new.depth,
            likes_count: 0,
            replies_count: 0,
            created_at: new.created_at,
            updated_at: new.created_at,
        };

        if let Some(parent) = new.parent_post_id.and_then(|id| state.posts.get_mut(&id)) {
            parent.replies_count += 1;
            parent.updated_at = Utc::now();
        }
        let thread = state.thread_mut(new.thread_id)?;
        thread.replies_count += 1;
        thread.last_post_at = Some(post.created_at);
        thread.last_post_user_id = Some(post.author_id);
        thread.updated_at = Utc::now();
        self.rescore(thread);

        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid, policy: DeletePolicy) -> StoreResult<DeletedPosts> {
        let mut state = self.state.lock().await;
        let post = state.post(id)?.clone();
        if policy == DeletePolicy::Reject && post.has_children() {
            return Err(StoreError::HasChildren(id));
        }

        let subtree = state.subtree(&post);
        for removed in &subtree {
            state.posts.remove(removed);
        }
        let gone: HashSet<Uuid> = subtree.iter().copied().collect();
        state
            .likes
            .retain(|(subject, subject_id, _)| *subject != LikeSubject::Post || !gone.contains(subject_id));

        if let Some(parent) = post.parent_post_id.and_then(|p| state.posts.get_mut(&p)) {
            parent.replies_count -= 1;
            parent.updated_at = Utc::now();
        }

        let last = state
            .posts
            .values()
            .filter(|p| p.thread_id == post.thread_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .map(|p| (p.created_at, p.author_id));

        let removed = subtree.len() as u64;
        let thread = state.thread_mut(post.thread_id)?;
        thread.replies_count -= removed as i64;
        thread.last_post_at = last.map(|(at, _)| at);
        thread.last_post_user_id = last.map(|(_, user)| user);
        thread.updated_at = Utc::now();
        self.rescore(thread);

        Ok(DeletedPosts {
            thread_id: post.thread_id,
            removed,
        })
    }

    async fn toggle_like(
        &self,
        subject: LikeSubject,
        subject_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<LikeOutcome> {
        let mut state = self.state.lock().await;
        let exists = match subject {
            LikeSubject::Thread => state.threads.contains_key(&subject_id),
            LikeSubject::Post => state.posts.contains_key(&subject_id),
        };
        if !exists {
            return Err(StoreError::not_found(subject.as_str(), subject_id));
        }

        let key = (subject, subject_id, user_id);
        let (liked, delta) = if state.likes.remove(&key) {
            (false, -1)
        } else {
            state.likes.insert(key);
            (true, 1)
        };

        let likes_count = match subject {
            LikeSubject::Thread => {
                let thread = state.thread_mut(subject_id)?;
                thread.likes_count += delta;
                self.rescore(thread);
                thread.likes_count
            }
            LikeSubject::Post => {
                let post = state
                    .posts
                    .get_mut(&subject_id)
                    .ok_or_else(|| StoreError::not_found("post", subject_id))?;
                post.likes_count += delta;
                post.likes_count
            }
        };
        Ok(LikeOutcome { liked, likes_count })
    }

    async fn thread_posts(&self, thread_id: Uuid, limit: u32) -> StoreResult<Vec<Post>> {
        let state = self.state.lock().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| p.thread_id == thread_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            (a.depth, a.created_at, a.id).cmp(&(b.depth, b.created_at, b.id))
        });
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn posts_by_depth(&self, query: DepthQuery) -> StoreResult<Vec<PostWithChildren>> {
        let state = self.state.lock().await;

        // (post, level): a given parent is level 0, thread roots are level 1
        let mut queue: VecDeque<(&Post, u32)> = match query.parent_id {
            Some(parent_id) => state
                .posts
                .get(&parent_id)
                .filter(|p| p.thread_id == query.thread_id)
                .map(|p| (p, 0))
                .into_iter()
                .collect(),
            None => state
                .children_of(query.thread_id, None)
                .into_iter()
                .map(|p| (p, 1))
                .collect(),
        };

        let mut found = Vec::new();
        while let Some((post, level)) = queue.pop_front() {
            found.push(post);
            if level < query.max_depth {
                queue.extend(
                    state
                        .children_of(query.thread_id, Some(post.id))
                        .into_iter()
                        .map(|c| (c, level + 1)),
                );
            }
        }

        found.sort_by(|a, b| (a.depth, a.created_at, a.id).cmp(&(b.depth, b.created_at, b.id)));
        Ok(found
            .into_iter()
            .take(query.limit as usize)
            .cloned()
            .map(PostWithChildren::from)
            .collect())
    }

    async fn post_context(&self, post_id: Uuid) -> StoreResult<ContextRows> {
        let state = self.state.lock().await;
        let target = state.post(post_id)?.clone();

        let mut ancestors = Vec::new();
        let mut cursor = target.parent_post_id;
        while let Some(id) = cursor {
            let Some(parent) = state.posts.get(&id) else {
                break;
            };
            ancestors.push(parent.clone());
            cursor = parent.parent_post_id;
        }
        ancestors.reverse();

        let mut siblings: Vec<Post> = state
            .children_of(target.thread_id, target.parent_post_id)
            .into_iter()
            .filter(|p| p.id != target.id)
            .cloned()
            .collect();
        siblings.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        siblings.truncate(CONTEXT_SIBLING_LIMIT as usize);

        Ok(ContextRows {
            target,
            ancestors,
            siblings,
        })
    }

    async fn search(
        &self,
        query: &SearchQuery,
        scope: SearchScope,
        category_id: Option<Uuid>,
        limit: u32,
    ) -> StoreResult<Vec<SearchResult>> {
        let state = self.state.lock().await;
        let terms = query.terms();
        let in_category = |t: &Thread| category_id.map_or(true, |c| t.category_id == c);

        let mut threads = Vec::new();
        if scope.includes_threads() {
            for thread in state.threads.values().filter(|t| in_category(t)) {
                let relevance = term_relevance(&terms, Some(&thread.title), &thread.content);
                if relevance > 0.0 {
                    threads.push(SearchResult {
                        kind: SearchKind::Thread,
                        id: thread.id,
                        thread_id: thread.id,
                        category_id: thread.category_id,
                        title: thread.title.clone(),
                        content: thread.content.clone(),
                        author_id: thread.author_id,
                        relevance,
                        created_at: thread.created_at,
                    });
                }
            }
        }

        let mut posts = Vec::new();
        if scope.includes_posts() {
            for post in state.posts.values() {
                let Some(thread) = state.threads.get(&post.thread_id).filter(|t| in_category(t))
                else {
                    continue;
                };
                let relevance = term_relevance(&terms, None, &post.content);
                if relevance > 0.0 {
                    posts.push(SearchResult {
                        kind: SearchKind::Post,
                        id: post.id,
                        thread_id: post.thread_id,
                        category_id: thread.category_id,
                        title: thread.title.clone(),
                        content: post.content.clone(),
                        author_id: post.author_id,
                        relevance,
                        created_at: post.created_at,
                    });
                }
            }
        }

        for hits in [&mut threads, &mut posts] {
            hits.sort_by(compare_results);
            hits.truncate(limit as usize);
        }
        threads.extend(posts);
        Ok(threads)
    }
}
