use chrono::Utc;

mod comment;
pub use comment::{CommentId, FetchedComment, NewComment};

mod error;
pub use error::Error;

mod issue;
pub use issue::{FetchedIssue, IssueRef};

mod source;
pub use source::{IssueSource, MarkdownRenderer, PersistentKv, UserDirectory, TRACKED_ISSUES_KEY};

pub type Time = chrono::DateTime<Utc>;
