use std::fmt;

use crate::{FetchedIssue, IssueRef, Time};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    /// Id of the synthetic comment holding the body of `issue`
    pub fn original_post(issue: &IssueRef) -> CommentId {
        CommentId(format!(
            "issue-{}-{}",
            issue.repo.replace('/', "-"),
            issue.number
        ))
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(s: &str) -> CommentId {
        CommentId(String::from(s))
    }
}

/// One comment as returned by the tracker, before it is attached to its issue
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FetchedComment {
    pub id: CommentId,
    pub author: String,
    pub date: Time,
    pub body: Option<String>,
}

/// A comment ready to be ingested into the pool
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub id: CommentId,
    pub author: String,
    pub date: Time,
    pub body: String,
    pub issue: IssueRef,
    pub issue_title: String,
    #[serde(default)]
    pub is_original_post: bool,
}

impl NewComment {
    pub fn from_fetched(issue: &IssueRef, title: &str, c: FetchedComment) -> NewComment {
        NewComment {
            id: c.id,
            author: c.author,
            date: c.date,
            body: c.body.unwrap_or_default(),
            issue: issue.clone(),
            issue_title: String::from(title),
            is_original_post: false,
        }
    }

    pub fn original_post(issue: &IssueRef, i: FetchedIssue) -> NewComment {
        NewComment {
            id: CommentId::original_post(issue),
            author: i.author,
            date: i.date,
            body: i.body.unwrap_or_default(),
            issue: issue.clone(),
            issue_title: i.title,
            is_original_post: true,
        }
    }

    /// The original post followed by all the comments of one issue
    pub fn thread(issue: &IssueRef, i: FetchedIssue, comments: Vec<FetchedComment>) -> Vec<NewComment> {
        let title = i.title.clone();
        let mut res = Vec::with_capacity(comments.len() + 1);
        res.push(NewComment::original_post(issue, i));
        res.extend(
            comments
                .into_iter()
                .map(|c| NewComment::from_fetched(issue, &title, c)),
        );
        res
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn thread_starts_with_original_post() {
        let issue = IssueRef::new("octo/cat", 3).unwrap();
        let date = chrono::Utc.timestamp_opt(1_000, 0).unwrap();
        let thread = NewComment::thread(
            &issue,
            FetchedIssue {
                author: String::from("alice"),
                date,
                body: None,
                title: String::from("Cats"),
            },
            vec![FetchedComment {
                id: CommentId::from("77"),
                author: String::from("bob"),
                date,
                body: Some(String::from("meow")),
            }],
        );
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].id, CommentId::from("issue-octo-cat-3"));
        assert!(thread[0].is_original_post);
        assert_eq!(thread[0].body, "");
        assert_eq!(thread[1].issue_title, "Cats");
        assert!(!thread[1].is_original_post);
    }
}
