//! PostgreSQL post store
//!
//! - Connection pool, never a shared connection
//! - Counters move with `SET x = x + 1` inside the same transaction as the
//!   row change; nothing is read, incremented in Rust and written back
//! - Rely on DB constraints and `ON CONFLICT`, no check-then-insert for likes
//! - Every transaction that touches posts locks the thread row first, so
//!   replies, deletes and likes in one thread run one after another

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forumctl_core::models::{
    Category, LikeOutcome, LikeSubject, Paginated, Pagination, Post, PostWithChildren, Thread,
};
use forumctl_core::{HotScore, SearchKind, SearchQuery, SearchResult, SearchScope, ThreadSort};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    ContextRows, DeletePolicy, DeletedPosts, DepthQuery, NewCategory, NewPost, NewThread,
    PostStore, StoreError, StoreResult, CONTEXT_SIBLING_LIMIT,
};

/// Default maximum connections for the pool
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub struct PgPostStore {
    pool: PgPool,
    hot: Arc<dyn HotScore>,
}

#[derive(Debug, FromRow)]
struct SearchRow {
    id: Uuid,
    thread_id: Uuid,
    category_id: Uuid,
    title: String,
    content: String,
    author_id: Uuid,
    relevance: f64,
    created_at: DateTime<Utc>,
}

impl SearchRow {
    fn into_result(self, kind: SearchKind) -> SearchResult {
        SearchResult {
            kind,
            id: self.id,
            thread_id: self.thread_id,
            category_id: self.category_id,
            title: self.title,
            content: self.content,
            author_id: self.author_id,
            relevance: self.relevance,
            created_at: self.created_at,
        }
    }
}

fn like_tables(subject: LikeSubject) -> (&'static str, &'static str) {
    match subject {
        LikeSubject::Thread => ("forum_threads", "forum_thread_likes"),
        LikeSubject::Post => ("forum_posts", "forum_post_likes"),
    }
}

fn order_clause(sort: ThreadSort) -> &'static str {
    match sort {
        ThreadSort::Newest => "is_pinned DESC, created_at DESC, id ASC",
        ThreadSort::Oldest => "is_pinned DESC, created_at ASC, id ASC",
        ThreadSort::Popular => "is_pinned DESC, hot_score DESC, created_at DESC, id ASC",
    }
}

impl PgPostStore {
    pub fn new(pool: PgPool, hot: Arc<dyn HotScore>) -> Self {
        Self { pool, hot }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Take the thread row lock. Must come before any post row lock.
    async fn lock_thread(&self, conn: &mut PgConnection, thread_id: Uuid) -> StoreResult<()> {
        sqlx::query("SELECT 1 FROM forum_threads WHERE id = $1 FOR UPDATE")
            .bind(thread_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::not_found("thread", thread_id))?;
        Ok(())
    }

    async fn thread_of_post(&self, conn: &mut PgConnection, post_id: Uuid) -> StoreResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("SELECT thread_id FROM forum_posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::not_found("post", post_id))
    }

    async fn count_thread_posts(&self, conn: &mut PgConnection, thread_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM forum_posts WHERE thread_id = $1")
            .bind(thread_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Recompute and persist the hot score from the row as it stands now.
    async fn refresh_hot_score(&self, conn: &mut PgConnection, thread: Thread) -> StoreResult<Thread> {
        let score = self.hot.score(&thread, Utc::now());
        let thread = sqlx::query_as::<_, Thread>(
            "UPDATE forum_threads SET hot_score = $2 WHERE id = $1 RETURNING *",
        )
        .bind(thread.id)
        .bind(score)
        .fetch_one(&mut *conn)
        .await?;
        Ok(thread)
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create_category(&self, new: NewCategory) -> StoreResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO forum_categories (name, description, color, icon)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.color.as_deref())
        .bind(new.icon.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM forum_categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("category", id))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM forum_categories ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn create_thread(&self, new: NewThread) -> StoreResult<Thread> {
        let mut tx = self.pool.begin().await?;

        let category_exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM forum_categories WHERE id = $1)")
                .bind(new.category_id)
                .fetch_one(&mut *tx)
                .await?;
        if !category_exists.0 {
            return Err(StoreError::not_found("category", new.category_id));
        }

        let thread = sqlx::query_as::<_, Thread>(
            r#"
            INSERT INTO forum_threads (category_id, title, content, author_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.category_id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.author_id)
        .fetch_one(&mut *tx)
        .await?;

        let thread = self.refresh_hot_score(&mut tx, thread).await?;
        tx.commit().await?;
        Ok(thread)
    }

    async fn get_thread(&self, id: Uuid) -> StoreResult<Thread> {
        sqlx::query_as::<_, Thread>("SELECT * FROM forum_threads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("thread", id))
    }

    async fn list_threads(
        &self,
        category_id: Option<Uuid>,
        sort: ThreadSort,
        page: Pagination,
    ) -> StoreResult<Paginated<Thread>> {
        let sql = format!(
            r#"
            SELECT * FROM forum_threads
            WHERE ($1::uuid IS NULL OR category_id = $1)
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            order_clause(sort)
        );
        let items = sqlx::query_as::<_, Thread>(&sql)
            .bind(category_id)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        // counted separately so a page past the end still reports the total
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM forum_threads WHERE ($1::uuid IS NULL OR category_id = $1)",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Paginated {
            items,
            total: total.max(0) as u64,
            page,
        })
    }

    async fn set_thread_flags(
        &self,
        id: Uuid,
        pinned: Option<bool>,
        locked: Option<bool>,
    ) -> StoreResult<Thread> {
        sqlx::query_as::<_, Thread>(
            r#"
            UPDATE forum_threads
            SET is_pinned = COALESCE($2, is_pinned),
                is_locked = COALESCE($3, is_locked),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(pinned)
        .bind(locked)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("thread", id))
    }

    async fn delete_thread(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM forum_threads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("thread", id));
        }
        Ok(())
    }

    async fn increment_thread_views(&self, id: Uuid) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let thread = sqlx::query_as::<_, Thread>(
            "UPDATE forum_threads SET views_count = views_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("thread", id))?;

        let thread = self.refresh_hot_score(&mut tx, thread).await?;
        tx.commit().await?;
        Ok(thread.views_count)
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Post> {
        sqlx::query_as::<_, Post>("SELECT * FROM forum_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("post", id))
    }

    async fn insert_post(&self, new: NewPost) -> StoreResult<Post> {
        let mut tx = self.pool.begin().await?;
        self.lock_thread(&mut tx, new.thread_id).await?;

        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO forum_posts (thread_id, parent_post_id, depth, author_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(new.thread_id)
        .bind(new.parent_post_id)
        .bind(new.depth)
        .bind(new.author_id)
        .bind(&new.content)
        .bind(new.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let thread = sqlx::query_as::<_, Thread>(
            r#"
            UPDATE forum_threads
            SET replies_count = replies_count + 1,
                last_post_at = $2,
                last_post_user_id = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(new.thread_id)
        .bind(post.created_at)
        .bind(post.author_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("thread", new.thread_id))?;

        if let Some(parent_id) = new.parent_post_id {
            let updated = sqlx::query(
                r#"
                UPDATE forum_posts
                SET replies_count = replies_count + 1, updated_at = NOW()
                WHERE id = $1 AND thread_id = $2
                "#,
            )
            .bind(parent_id)
            .bind(new.thread_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(StoreError::not_found("post", parent_id));
            }
        }

        self.refresh_hot_score(&mut tx, thread).await?;
        tx.commit().await?;

        tracing::debug!(post_id = %post.id, thread_id = %post.thread_id, depth = post.depth, "post inserted");
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid, policy: DeletePolicy) -> StoreResult<DeletedPosts> {
        let mut tx = self.pool.begin().await?;

        let thread_id = self.thread_of_post(&mut tx, id).await?;
        self.lock_thread(&mut tx, thread_id).await?;

        // re-read under the lock, a concurrent delete may have taken it
        let post = sqlx::query_as::<_, Post>("SELECT * FROM forum_posts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("post", id))?;

        if policy == DeletePolicy::Reject && post.has_children() {
            return Err(StoreError::HasChildren(id));
        }

        let before = self.count_thread_posts(&mut tx, post.thread_id).await?;
        sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM forum_posts WHERE id = $1
                UNION ALL
                SELECT p.id FROM forum_posts p JOIN subtree s ON p.parent_post_id = s.id
            )
            DELETE FROM forum_posts WHERE id IN (SELECT id FROM subtree)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        // counted by difference: the parent FK cascade removes rows the CTE never listed
        let after = self.count_thread_posts(&mut tx, post.thread_id).await?;
        let removed = (before - after).max(0) as u64;

        if let Some(parent_id) = post.parent_post_id {
            sqlx::query(
                r#"
                UPDATE forum_posts
                SET replies_count = replies_count - 1, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;
        }

        let thread = sqlx::query_as::<_, Thread>(
            r#"
            UPDATE forum_threads
            SET replies_count = replies_count - $2,
                (last_post_at, last_post_user_id) = (
                    SELECT created_at, author_id FROM forum_posts
                    WHERE thread_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT 1
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(post.thread_id)
        .bind(removed as i64)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("thread", post.thread_id))?;

        self.refresh_hot_score(&mut tx, thread).await?;
        tx.commit().await?;

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
        let (table, likes) = like_tables(subject);
        let mut tx = self.pool.begin().await?;

        let thread_id = match subject {
            LikeSubject::Thread => subject_id,
            LikeSubject::Post => self.thread_of_post(&mut tx, subject_id).await?,
        };
        self.lock_thread(&mut tx, thread_id).await?;

        let exists: (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            table
        ))
        .bind(subject_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists.0 {
            return Err(StoreError::not_found(subject.as_str(), subject_id));
        }

        let unliked = sqlx::query(&format!(
            "DELETE FROM {} WHERE subject_id = $1 AND user_id = $2",
            likes
        ))
        .bind(subject_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        let (liked, delta) = if unliked {
            (false, -1i64)
        } else {
            // a concurrent toggle may have inserted first: that is "already liked"
            let inserted = sqlx::query(&format!(
                "INSERT INTO {} (subject_id, user_id) VALUES ($1, $2) ON CONFLICT (subject_id, user_id) DO NOTHING",
                likes
            ))
            .bind(subject_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;
            (true, if inserted { 1 } else { 0 })
        };

        let likes_count = match subject {
            LikeSubject::Thread => {
                let thread = sqlx::query_as::<_, Thread>(
                    "UPDATE forum_threads SET likes_count = likes_count + $2 WHERE id = $1 RETURNING *",
                )
                .bind(subject_id)
                .bind(delta)
                .fetch_one(&mut *tx)
                .await?;
                self.refresh_hot_score(&mut tx, thread).await?.likes_count
            }
            LikeSubject::Post => {
                sqlx::query_scalar::<_, i64>(
                    "UPDATE forum_posts SET likes_count = likes_count + $2 WHERE id = $1 RETURNING likes_count",
                )
                .bind(subject_id)
                .bind(delta)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(LikeOutcome { liked, likes_count })
    }

    async fn thread_posts(&self, thread_id: Uuid, limit: u32) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM forum_posts
            WHERE thread_id = $1
            ORDER BY depth ASC, created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(thread_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn posts_by_depth(&self, query: DepthQuery) -> StoreResult<Vec<PostWithChildren>> {
        // the anchor sits at level 0 when a parent is given, otherwise the
        // root posts are level 1
        let anchor = match query.parent_id {
            Some(_) => "SELECT p.*, 0 AS lvl FROM forum_posts p WHERE p.thread_id = $1 AND p.id = $2",
            None => "SELECT p.*, 1 AS lvl FROM forum_posts p WHERE p.thread_id = $1 AND p.parent_post_id IS NULL AND $2::uuid IS NULL",
        };
        let sql = format!(
            r#"
            WITH RECURSIVE scoped AS (
                {}
                UNION ALL
                SELECT c.*, s.lvl + 1 FROM forum_posts c
                JOIN scoped s ON c.parent_post_id = s.id
                WHERE s.lvl < $3
            )
            SELECT scoped.*, replies_count > 0 AS has_children
            FROM scoped
            ORDER BY depth ASC, created_at ASC, id ASC
            LIMIT $4
            "#,
            anchor
        );

        let posts = sqlx::query_as::<_, PostWithChildren>(&sql)
            .bind(query.thread_id)
            .bind(query.parent_id)
            .bind(query.max_depth.min(i32::MAX as u32) as i32)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn post_context(&self, post_id: Uuid) -> StoreResult<ContextRows> {
        let target = self.get_post(post_id).await?;

        let ancestors = sqlx::query_as::<_, Post>(
            r#"
            WITH RECURSIVE chain AS (
                SELECT * FROM forum_posts WHERE id = $1
                UNION ALL
                SELECT p.* FROM forum_posts p JOIN chain c ON p.id = c.parent_post_id
            )
            SELECT * FROM chain WHERE id <> $1 ORDER BY depth ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let siblings = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM forum_posts
            WHERE thread_id = $1 AND parent_post_id IS NOT DISTINCT FROM $2 AND id <> $3
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(target.thread_id)
        .bind(target.parent_post_id)
        .bind(post_id)
        .bind(CONTEXT_SIBLING_LIMIT)
        .fetch_all(&self.pool)
        .await?;

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
        let mut results = Vec::new();

        if scope.includes_threads() {
            let rows = sqlx::query_as::<_, SearchRow>(
                r#"
                SELECT t.id, t.id AS thread_id, t.category_id, t.title, t.content, t.author_id, t.created_at,
                       ts_rank(to_tsvector('english', t.title || ' ' || t.content), q)::float8 AS relevance
                FROM forum_threads t
                CROSS JOIN plainto_tsquery('english', $1) AS q
                WHERE to_tsvector('english', t.title || ' ' || t.content) @@ q
                  AND ($2::uuid IS NULL OR t.category_id = $2)
                ORDER BY relevance DESC, t.created_at DESC
                LIMIT $3
                "#,
            )
            .bind(query.as_str())
            .bind(category_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            results.extend(rows.into_iter().map(|r| r.into_result(SearchKind::Thread)));
        }

        if scope.includes_posts() {
            let rows = sqlx::query_as::<_, SearchRow>(
                r#"
                SELECT p.id, p.thread_id, t.category_id, t.title, p.content, p.author_id, p.created_at,
                       ts_rank(to_tsvector('english', p.content), q)::float8 AS relevance
                FROM forum_posts p
                JOIN forum_threads t ON t.id = p.thread_id
                CROSS JOIN plainto_tsquery('english', $1) AS q
                WHERE to_tsvector('english', p.content) @@ q
                  AND ($2::uuid IS NULL OR t.category_id = $2)
                ORDER BY relevance DESC, p.created_at DESC
                LIMIT $3
                "#,
            )
            .bind(query.as_str())
            .bind(category_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            results.extend(rows.into_iter().map(|r| r.into_result(SearchKind::Post)));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::migrations;
    use forumctl_core::DecayingEngagement;

    // Run with: DATABASE_URL=postgres://... cargo test -p forumctl-server -- --ignored

    async fn store() -> PgPostStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url, DEFAULT_MAX_CONNECTIONS)
            .await
            .expect("pool creation failed");
        migrations::run(&pool).await.expect("migrations failed");
        PgPostStore::new(pool, Arc::new(DecayingEngagement::default()))
    }

    async fn seed_thread(store: &PgPostStore) -> Thread {
        let category = store
            .create_category(NewCategory {
                name: format!("test-{}", Uuid::new_v4()),
                description: String::new(),
                color: None,
                icon: None,
            })
            .await
            .expect("category");
        store
            .create_thread(NewThread {
                category_id: category.id,
                title: "pg test".into(),
                content: "body".into(),
                author_id: Uuid::new_v4(),
            })
            .await
            .expect("thread")
    }

    fn reply(thread: &Thread, parent: Option<&Post>) -> NewPost {
        NewPost {
            thread_id: thread.id,
            parent_post_id: parent.map(|p| p.id),
            depth: parent.map(|p| p.depth + 1).unwrap_or(0),
            author_id: Uuid::new_v4(),
            content: "reply".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn order_clause_always_pins_first() {
        for sort in [ThreadSort::Newest, ThreadSort::Oldest, ThreadSort::Popular] {
            assert!(order_clause(sort).starts_with("is_pinned DESC"));
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reply_chain_keeps_counters() {
        let store = store().await;
        let thread = seed_thread(&store).await;

        let a = store.insert_post(reply(&thread, None)).await.unwrap();
        let b = store.insert_post(reply(&thread, Some(&a))).await.unwrap();
        let c = store.insert_post(reply(&thread, Some(&b))).await.unwrap();
        assert_eq!((a.depth, b.depth, c.depth), (0, 1, 2));

        assert_eq!(store.get_thread(thread.id).await.unwrap().replies_count, 3);
        assert_eq!(store.get_post(a.id).await.unwrap().replies_count, 1);

        let deleted = store.delete_post(b.id, DeletePolicy::Cascade).await.unwrap();
        assert_eq!(deleted.removed, 2);
        assert_eq!(store.get_thread(thread.id).await.unwrap().replies_count, 1);
        assert_eq!(store.get_post(a.id).await.unwrap().replies_count, 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reply_into_other_thread_violates_constraint() {
        let store = store().await;
        let first = seed_thread(&store).await;
        let second = seed_thread(&store).await;
        let parent = store.insert_post(reply(&first, None)).await.unwrap();

        let stray = reply(&second, Some(&parent));
        let err = store.insert_post(stray).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }), "{:?}", err);
    }

    async fn live_posts(store: &PgPostStore, thread_id: Uuid) -> i64 {
        let mut conn = store.pool().acquire().await.expect("connection");
        store.count_thread_posts(&mut conn, thread_id).await.expect("count")
    }

    fn lost_parent(err: &StoreError) -> bool {
        matches!(err, StoreError::NotFound { .. } | StoreError::Constraint { .. })
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reply_racing_subtree_delete_never_deadlocks() {
        let store = store().await;

        for _ in 0..20 {
            let thread = seed_thread(&store).await;
            let a = store.insert_post(reply(&thread, None)).await.unwrap();
            let b = store.insert_post(reply(&thread, Some(&a))).await.unwrap();

            let (inserted, deleted) = tokio::join!(
                store.insert_post(reply(&thread, Some(&b))),
                store.delete_post(a.id, DeletePolicy::Cascade),
            );
            deleted.expect("delete failed");
            if let Err(err) = inserted {
                assert!(lost_parent(&err), "{:?}", err);
            }
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reply_under_grandchild_during_delete_keeps_thread_count() {
        let store = store().await;

        for _ in 0..20 {
            let thread = seed_thread(&store).await;
            let a = store.insert_post(reply(&thread, None)).await.unwrap();
            let b = store.insert_post(reply(&thread, Some(&a))).await.unwrap();
            let c = store.insert_post(reply(&thread, Some(&b))).await.unwrap();
            store.insert_post(reply(&thread, None)).await.unwrap();

            let (inserted, deleted) = tokio::join!(
                store.insert_post(reply(&thread, Some(&c))),
                store.delete_post(a.id, DeletePolicy::Cascade),
            );
            let deleted = deleted.expect("delete failed");
            match inserted {
                Ok(_) => assert_eq!(deleted.removed, 4),
                Err(err) => {
                    assert!(lost_parent(&err), "{:?}", err);
                    assert_eq!(deleted.removed, 3);
                }
            }

            let counted = store.get_thread(thread.id).await.unwrap().replies_count;
            assert_eq!(counted, live_posts(&store, thread.id).await);
            assert_eq!(counted, 1);
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn concurrent_identical_likes_count_once() {
        let store = Arc::new(store().await);
        let thread = seed_thread(&store).await;
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.toggle_like(LikeSubject::Thread, thread.id, user).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task panicked").expect("toggle failed");
        }

        // either both saw "like" (count 1) or the second undid the first (count 0)
        let likes = store.get_thread(thread.id).await.unwrap().likes_count;
        assert!(likes == 0 || likes == 1, "likes_count = {}", likes);
    }
}
