//! Schema for the forum tables
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so it runs on each start.

use sqlx::PgPool;

use super::StoreResult;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "forum_categories",
        r#"
        CREATE TABLE IF NOT EXISTS forum_categories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            color TEXT,
            icon TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "forum_threads",
        r#"
        CREATE TABLE IF NOT EXISTS forum_threads (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            category_id UUID NOT NULL REFERENCES forum_categories(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            author_id UUID NOT NULL,
            is_pinned BOOLEAN NOT NULL DEFAULT FALSE,
            is_locked BOOLEAN NOT NULL DEFAULT FALSE,
            views_count BIGINT NOT NULL DEFAULT 0 CHECK (views_count >= 0),
            replies_count BIGINT NOT NULL DEFAULT 0 CHECK (replies_count >= 0),
            likes_count BIGINT NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
            hot_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            last_post_at TIMESTAMPTZ,
            last_post_user_id UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    // (parent_post_id, thread_id) -> (id, thread_id) keeps replies in their
    // parent's thread; deleting a post cascades to its subtree.
    (
        "forum_posts",
        r#"
        CREATE TABLE IF NOT EXISTS forum_posts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            thread_id UUID NOT NULL REFERENCES forum_threads(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            author_id UUID NOT NULL,
            parent_post_id UUID,
            depth INTEGER NOT NULL DEFAULT 0 CHECK (depth >= 0),
            likes_count BIGINT NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
            replies_count BIGINT NOT NULL DEFAULT 0 CHECK (replies_count >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT forum_posts_id_thread_key UNIQUE (id, thread_id),
            CONSTRAINT forum_posts_parent_fkey FOREIGN KEY (parent_post_id, thread_id)
                REFERENCES forum_posts(id, thread_id) ON DELETE CASCADE,
            CONSTRAINT forum_posts_root_depth CHECK ((parent_post_id IS NULL) = (depth = 0))
        )
        "#,
    ),
    (
        "forum_thread_likes",
        r#"
        CREATE TABLE IF NOT EXISTS forum_thread_likes (
            subject_id UUID NOT NULL REFERENCES forum_threads(id) ON DELETE CASCADE,
            user_id UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT forum_thread_likes_key UNIQUE (subject_id, user_id)
        )
        "#,
    ),
    (
        "forum_post_likes",
        r#"
        CREATE TABLE IF NOT EXISTS forum_post_likes (
            subject_id UUID NOT NULL REFERENCES forum_posts(id) ON DELETE CASCADE,
            user_id UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT forum_post_likes_key UNIQUE (subject_id, user_id)
        )
        "#,
    ),
    (
        "idx_forum_threads_category",
        "CREATE INDEX IF NOT EXISTS idx_forum_threads_category
            ON forum_threads(category_id, is_pinned DESC, created_at DESC)",
    ),
    (
        "idx_forum_threads_hot",
        "CREATE INDEX IF NOT EXISTS idx_forum_threads_hot
            ON forum_threads(is_pinned DESC, hot_score DESC)",
    ),
    (
        "idx_forum_posts_thread_depth",
        "CREATE INDEX IF NOT EXISTS idx_forum_posts_thread_depth
            ON forum_posts(thread_id, depth, created_at)",
    ),
    (
        "idx_forum_posts_parent",
        "CREATE INDEX IF NOT EXISTS idx_forum_posts_parent
            ON forum_posts(parent_post_id, created_at)",
    ),
    (
        "idx_forum_threads_fts",
        "CREATE INDEX IF NOT EXISTS idx_forum_threads_fts
            ON forum_threads USING GIN (to_tsvector('english', title || ' ' || content))",
    ),
    (
        "idx_forum_posts_fts",
        "CREATE INDEX IF NOT EXISTS idx_forum_posts_fts
            ON forum_posts USING GIN (to_tsvector('english', content))",
    ),
];

/// Create all forum tables and indexes.
pub async fn run(pool: &PgPool) -> StoreResult<()> {
    tracing::info!("Running forum migrations...");

    for (name, sql) in STATEMENTS {
        tracing::debug!(object = name, "applying");
        sqlx::query(sql).execute(pool).await?;
    }

    tracing::info!("Forum migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_precede_their_indexes() {
        let position = |name: &str| STATEMENTS.iter().position(|(n, _)| *n == name);
        for (name, sql) in STATEMENTS.iter().filter(|(n, _)| n.starts_with("idx_")) {
            let rest = sql.split(" ON ").nth(1).expect("index target");
            let table = rest.split(['(', ' ']).next().unwrap_or_default();
            let table_pos = position(table).expect("indexed table is created here");
            assert!(table_pos < position(name).unwrap(), "{} precedes {}", name, table);
        }
    }

    #[test]
    fn every_statement_is_idempotent() {
        for (name, sql) in STATEMENTS {
            assert!(sql.contains("IF NOT EXISTS"), "{} is not idempotent", name);
        }
    }
}
