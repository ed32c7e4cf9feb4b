//! Permission guard: state-free authorization per action
//!
//! | action          | rule                                                        |
//! |-----------------|-------------------------------------------------------------|
//! | read            | always allowed                                              |
//! | reply / like    | authenticated; locked threads only for moderators           |
//! | delete post     | moderator, or the post's author                             |
//! | delete thread   | moderator, or author while unreplied or within grace period |
//! | moderate        | moderator                                                   |

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{ForumError, ForumResult};
use crate::models::{Actor, Post, Thread};

/// Window after creation during which an author may delete a replied thread
pub const THREAD_DELETE_GRACE_SECS: i64 = 60 * 60;

pub fn thread_delete_grace() -> TimeDelta {
    TimeDelta::seconds(THREAD_DELETE_GRACE_SECS)
}

/// Action being authorized, with the records the rule depends on
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    Read,
    Reply { thread: &'a Thread },
    Like { thread: &'a Thread },
    CreateThread,
    DeletePost { post: &'a Post },
    DeleteThread { thread: &'a Thread },
    /// Pin, lock, category management
    Moderate,
}

impl Action<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Reply { .. } => "reply",
            Self::Like { .. } => "like",
            Self::CreateThread => "create_thread",
            Self::DeletePost { .. } => "delete_post",
            Self::DeleteThread { .. } => "delete_thread",
            Self::Moderate => "moderate",
        }
    }
}

/// Authorize `action` for `actor` (`None` = anonymous) at time `now`.
pub fn authorize(actor: Option<&Actor>, action: Action<'_>, now: DateTime<Utc>) -> ForumResult<()> {
    if let Action::Read = action {
        return Ok(());
    }

    let Some(actor) = actor else {
        return Err(ForumError::Unauthenticated);
    };

    let verdict = evaluate(actor, action, now);
    if let Err(ref err) = verdict {
        tracing::warn!(
            user_id = %actor.user_id,
            role = %actor.role,
            action = action.name(),
            reason = %err,
            "action denied"
        );
    }
    verdict
}

fn evaluate(actor: &Actor, action: Action<'_>, now: DateTime<Utc>) -> ForumResult<()> {
    if actor.is_moderator() {
        return Ok(());
    }

    match action {
        Action::Read | Action::CreateThread => Ok(()),
        Action::Reply { thread } | Action::Like { thread } => {
            if thread.is_locked {
                Err(ForumError::forbidden("thread is locked"))
            } else {
                Ok(())
            }
        }
        Action::DeletePost { post } => {
            if post.author_id == actor.user_id {
                Ok(())
            } else {
                Err(ForumError::forbidden("only the author or a moderator can delete this post"))
            }
        }
        Action::DeleteThread { thread } => {
            if thread.author_id != actor.user_id {
                return Err(ForumError::forbidden(
                    "only the author or a moderator can delete this thread",
                ));
            }
            if thread.replies_count == 0 || thread.age(now) <= thread_delete_grace() {
                Ok(())
            } else {
                Err(ForumError::forbidden(
                    "thread has replies and is past the one hour deletion window",
                ))
            }
        }
        Action::Moderate => Err(ForumError::forbidden("moderator role required")),
    }
}
