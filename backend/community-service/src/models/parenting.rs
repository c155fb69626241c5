use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Authored;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParentingPost {
    pub id: i64,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authored for ParentingPost {
    fn author_id(&self) -> Option<i64> {
        Some(self.author_id)
    }
}

/// Comment row joined with its author's username
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParentingComment {
    pub id: i64,
    pub post_id: Option<i64>,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub parent_comment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ParentingComment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

impl Authored for ParentingComment {
    fn author_id(&self) -> Option<i64> {
        Some(self.author_id)
    }
}

/// A top-level comment with its direct replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: ParentingComment,
    pub replies: Vec<ParentingComment>,
}

/// Group a flat, chronologically ordered comment list into threads.
///
/// Replies whose parent is not in `comments` are dropped.
pub fn build_threads(comments: Vec<ParentingComment>) -> Vec<CommentThread> {
    let (roots, replies): (Vec<_>, Vec<_>) = comments.into_iter().partition(|c| !c.is_reply());

    let mut threads: Vec<CommentThread> = roots
        .into_iter()
        .map(|comment| CommentThread {
            comment,
            replies: Vec::new(),
        })
        .collect();

    for reply in replies {
        if let Some(thread) = threads
            .iter_mut()
            .find(|t| Some(t.comment.id) == reply.parent_comment_id)
        {
            thread.replies.push(reply);
        }
    }

    threads
}
