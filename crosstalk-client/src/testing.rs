#![cfg(test)]

use std::sync::Arc;

use chrono::TimeZone;

use crate::{
    api::{CommentId, IssueRef, NewComment, Time},
    Comment,
};

pub fn issue(n: u64) -> IssueRef {
    IssueRef::new("octo/cat", n).expect("building test issue ref")
}

pub fn at(minutes: i64) -> Time {
    chrono::Utc
        .timestamp_opt(1_600_000_000 + minutes * 60, 0)
        .unwrap()
}

pub fn new_comment(id: &str, author: &str, minutes: i64, body: &str) -> NewComment {
    new_comment_in(1, id, author, minutes, body)
}

pub fn new_comment_in(issue_n: u64, id: &str, author: &str, minutes: i64, body: &str) -> NewComment {
    NewComment {
        id: CommentId::from(id),
        author: String::from(author),
        date: at(minutes),
        body: String::from(body),
        issue: issue(issue_n),
        issue_title: format!("Issue {issue_n}"),
        is_original_post: false,
    }
}

pub fn comment_by(id: &str, author: &str, minutes: i64, body: &str) -> Comment {
    Comment::new(new_comment(id, author, minutes, body), minutes as u64)
}

pub fn comment(id: &str, minutes: i64, body: &str) -> Comment {
    comment_by(id, "someone", minutes, body)
}

/// Pool sorted the way the state manager sorts it
pub fn pool(comments: Vec<Comment>) -> Vec<Arc<Comment>> {
    let mut res = comments.into_iter().map(Arc::new).collect::<Vec<_>>();
    res.sort_by_key(|c| c.position());
    res
}

pub fn id(s: &str) -> CommentId {
    CommentId::from(s)
}
