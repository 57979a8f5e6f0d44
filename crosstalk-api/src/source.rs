use async_trait::async_trait;

use crate::{Error, FetchedComment, FetchedIssue, IssueRef};

/// Key under which the tracked-issue set is persisted
pub const TRACKED_ISSUES_KEY: &str = "trackedIssues";

#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn fetch_issue(&self, issue: &IssueRef) -> Result<FetchedIssue, Error>;

    /// All the comments of `issue`, oldest first, across every page
    async fn fetch_comments(&self, issue: &IssueRef) -> Result<Vec<FetchedComment>, Error>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Best-effort: the empty string on any failure
    async fn fetch_company(&self, login: &str) -> String;
}

pub trait MarkdownRenderer {
    /// Renders to markup that is safe to display
    fn render(&self, text: &str) -> String;
}

#[async_trait]
pub trait PersistentKv: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
}
