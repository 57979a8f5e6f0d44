use std::collections::BTreeSet;

use crate::api::{CommentId, IssueRef, NewComment, Time};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    pub date: Time,

    /// Arrival order, breaks ties between comments posted at the same time
    pub seq: u64,

    pub body: String,
    pub issue: IssueRef,
    pub issue_title: String,
    pub is_original_post: bool,

    /// Earlier comments this one quotes or mentions, as of the last resolution pass
    pub references: BTreeSet<CommentId>,
}

impl Comment {
    pub fn new(c: NewComment, seq: u64) -> Comment {
        Comment {
            id: c.id,
            author: c.author,
            date: c.date,
            seq,
            body: c.body,
            issue: c.issue,
            issue_title: c.issue_title,
            is_original_post: c.is_original_post,
            references: BTreeSet::new(),
        }
    }

    /// Key of the total order of the pool
    pub fn position(&self) -> (Time, u64) {
        (self.date, self.seq)
    }

    pub fn is_before(&self, other: &Comment) -> bool {
        self.position() < other.position()
    }

    /// The first 50 characters of the body, for reference footers
    pub fn snippet(&self) -> String {
        const SNIPPET_LEN: usize = 50;
        let mut chars = self.body.chars();
        let res = chars.by_ref().take(SNIPPET_LEN).collect::<String>();
        match chars.next() {
            Some(_) => res + "...",
            None => res,
        }
    }
}
