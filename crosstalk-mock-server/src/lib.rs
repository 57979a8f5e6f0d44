use std::{
    collections::{btree_map, BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use crosstalk_api::{
    Error, FetchedComment, FetchedIssue, IssueRef, IssueSource, PersistentKv, UserDirectory,
};

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory issue tracker
pub struct MockServer {
    issues: BTreeMap<IssueRef, MockIssue>,
    companies: HashMap<String, String>,
    failures: HashMap<IssueRef, Error>,
    latency: HashMap<IssueRef, Duration>,
    page_size: usize,
    pages_served: AtomicUsize,
}

#[derive(Debug)]
struct MockIssue {
    issue: FetchedIssue,
    comments: Vec<FetchedComment>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            issues: BTreeMap::new(),
            companies: HashMap::new(),
            failures: HashMap::new(),
            latency: HashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            pages_served: AtomicUsize::new(0),
        }
    }

    /// Returns false if the issue already existed
    pub fn add_issue(&mut self, issue: IssueRef, data: FetchedIssue) -> bool {
        match self.issues.entry(issue) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(entry) => {
                entry.insert(MockIssue {
                    issue: data,
                    comments: Vec::new(),
                });
                true
            }
        }
    }

    pub fn add_comment(&mut self, issue: &IssueRef, c: FetchedComment) -> Result<(), Error> {
        let i = self
            .issues
            .get_mut(issue)
            .ok_or_else(|| Error::NotFound(issue.clone()))?;
        i.comments.push(c);
        i.comments.sort_by_key(|c| c.date);
        Ok(())
    }

    pub fn set_company(&mut self, login: &str, company: &str) {
        self.companies
            .insert(String::from(login), String::from(company));
    }

    /// Every request about `issue` will fail with `err`
    pub fn fail_issue(&mut self, issue: IssueRef, err: Error) {
        self.failures.insert(issue, err);
    }

    /// Every request about `issue` will take `delay` to answer
    pub fn set_latency(&mut self, issue: IssueRef, delay: Duration) {
        self.latency.insert(issue, delay);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    /// Number of comment pages served so far
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    async fn request(&self, issue: &IssueRef) -> Result<&MockIssue, Error> {
        if let Some(delay) = self.latency.get(issue) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(err) = self.failures.get(issue) {
            return Err(err.clone());
        }
        self.issues
            .get(issue)
            .ok_or_else(|| Error::NotFound(issue.clone()))
    }

    /// One page of comments, with the cursor of the next page if any
    async fn comments_page(
        &self,
        issue: &IssueRef,
        cursor: usize,
    ) -> Result<(Vec<FetchedComment>, Option<usize>), Error> {
        let i = self.request(issue).await?;
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        let end = (cursor + self.page_size).min(i.comments.len());
        let page = i.comments[cursor.min(end)..end].to_vec();
        let next = (end < i.comments.len()).then_some(end);
        Ok((page, next))
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[async_trait]
impl IssueSource for MockServer {
    async fn fetch_issue(&self, issue: &IssueRef) -> Result<FetchedIssue, Error> {
        Ok(self.request(issue).await?.issue.clone())
    }

    async fn fetch_comments(&self, issue: &IssueRef) -> Result<Vec<FetchedComment>, Error> {
        let mut res = Vec::new();
        let mut cursor = Some(0);
        while let Some(c) = cursor {
            let (page, next) = self.comments_page(issue, c).await?;
            res.extend(page);
            cursor = next;
        }
        Ok(res)
    }
}

#[async_trait]
impl UserDirectory for MockServer {
    async fn fetch_company(&self, login: &str) -> String {
        self.companies.get(login).cloned().unwrap_or_default()
    }
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryKv(Mutex<HashMap<String, String>>);

impl MemoryKv {
    pub fn new() -> MemoryKv {
        MemoryKv::default()
    }
}

#[async_trait]
impl PersistentKv for MemoryKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let kv = self
            .0
            .lock()
            .map_err(|_| anyhow::anyhow!("memory kv lock poisoned"))?;
        Ok(kv.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        tracing::debug!(key, "storing value");
        self.0
            .lock()
            .map_err(|_| anyhow::anyhow!("memory kv lock poisoned"))?
            .insert(String::from(key), value);
        Ok(())
    }
}
