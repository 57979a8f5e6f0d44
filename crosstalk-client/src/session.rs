use std::{
    collections::BTreeSet,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::Context;
use futures::future;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    api::{Error, IssueRef, IssueSource, NewComment, PersistentKv, UserDirectory, TRACKED_ISSUES_KEY},
    StateManager,
};

/// Outcome of one refresh of every tracked issue
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Issues that were loaded, with their number of comments (original post included)
    pub loaded: Vec<(IssueRef, usize)>,
    pub failed: Vec<(IssueRef, Error)>,

    /// A newer refresh started meanwhile, so this one was discarded
    pub superseded: bool,
}

/// A state manager shared between concurrent tasks
///
/// The mutex serializes every operation on the state. Network round trips
/// happen without holding it.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<StateManager>>,
    generation: Arc<AtomicU64>,
}

impl Default for Session {
    fn default() -> Session {
        Session::new(StateManager::new())
    }
}

impl Session {
    pub fn new(state: StateManager) -> Session {
        Session {
            state: Arc::new(Mutex::new(state)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, StateManager> {
        self.state.lock().await
    }

    /// Restores the tracked issues saved by [`Session::save_tracked`]
    pub async fn load_tracked(&self, kv: &dyn PersistentKv) -> anyhow::Result<()> {
        let Some(saved) = kv
            .get(TRACKED_ISSUES_KEY)
            .await
            .context("reading saved tracked issues")?
        else {
            return Ok(());
        };
        let saved: Vec<String> =
            serde_json::from_str(&saved).context("parsing saved tracked issues")?;
        let mut issues = BTreeSet::new();
        for s in saved {
            match IssueRef::from_str(&s) {
                Ok(i) => {
                    issues.insert(i);
                }
                Err(err) => tracing::warn!(%err, "skipping saved tracked issue"),
            }
        }
        self.lock().await.set_tracked_issues(issues);
        Ok(())
    }

    pub async fn save_tracked(&self, kv: &dyn PersistentKv) -> anyhow::Result<()> {
        let issues = self
            .lock()
            .await
            .tracked_issues()
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>();
        let json = serde_json::to_string(&issues).context("serializing tracked issues")?;
        kv.set(TRACKED_ISSUES_KEY, json)
            .await
            .context("saving tracked issues")
    }

    /// Tracks `issue` and refreshes everything
    ///
    /// Returns `None` if the issue was already tracked.
    pub async fn add_issue(
        &self,
        kv: &dyn PersistentKv,
        source: &dyn IssueSource,
        issue: IssueRef,
    ) -> anyhow::Result<Option<RefreshReport>> {
        if !self.lock().await.track_issue(issue) {
            return Ok(None);
        }
        self.save_tracked(kv).await?;
        Ok(Some(self.refresh_all(source).await))
    }

    pub async fn remove_issue(&self, kv: &dyn PersistentKv, issue: &IssueRef) -> anyhow::Result<bool> {
        if !self.lock().await.remove_issue(issue) {
            return Ok(false);
        }
        self.save_tracked(kv).await?;
        Ok(true)
    }

    /// Fetches every tracked issue concurrently and replaces the pool with the result
    ///
    /// Issues that fail are reported and left out; the others are still loaded.
    /// Issues untracked while fetching are left out too. If another refresh
    /// starts before this one is done, this one is discarded.
    pub async fn refresh_all(&self, source: &dyn IssueSource) -> RefreshReport {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let issues = self.lock().await.tracked_issues().clone();
        tracing::info!(generation, issues = issues.len(), "refreshing tracked issues");

        let results = future::join_all(issues.iter().map(|i| fetch_thread(source, i))).await;

        let mut report = RefreshReport::default();
        let mut threads = Vec::new();
        for (issue, res) in issues.into_iter().zip(results) {
            match res {
                Ok(thread) => threads.push((issue, thread)),
                Err(err) => {
                    tracing::warn!(%issue, %err, "failed fetching issue");
                    report.failed.push((issue, err));
                }
            }
        }

        let mut state = self.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::info!(generation, "discarding refresh superseded by a newer one");
            report.superseded = true;
            return report;
        }
        let mut comments = Vec::new();
        for (issue, thread) in threads {
            if !state.tracked_issues().contains(&issue) {
                tracing::info!(%issue, "dropping issue untracked during refresh");
                continue;
            }
            report.loaded.push((issue, thread.len()));
            comments.extend(thread);
        }
        state.replace_all(comments);
        tracing::info!(
            generation,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            comments = state.comments().len(),
            "refresh done"
        );
        report
    }

    /// Looks up the company of every author in the pool
    pub async fn fetch_companies(&self, directory: &dyn UserDirectory) {
        let authors = self
            .lock()
            .await
            .comments()
            .iter()
            .map(|c| c.author.clone())
            .collect::<BTreeSet<_>>();
        let companies = future::join_all(authors.into_iter().map(|login| async move {
            let company = directory.fetch_company(&login).await;
            (login, company)
        }))
        .await;
        self.lock()
            .await
            .set_companies(companies.into_iter().filter(|(_, c)| !c.is_empty()));
    }
}

async fn fetch_thread(source: &dyn IssueSource, issue: &IssueRef) -> Result<Vec<NewComment>, Error> {
    let (i, comments) =
        future::try_join(source.fetch_issue(issue), source.fetch_comments(issue)).await?;
    Ok(NewComment::thread(issue, i, comments))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crosstalk_mock_server::{MemoryKv, MockServer};

    use super::*;
    use crate::{
        api::{CommentId, FetchedComment, FetchedIssue},
        testing::*,
    };

    fn add_thread(s: &mut MockServer, n: u64, author: &str, body: &str, comments: &[(&str, &str, i64, &str)]) {
        s.add_issue(
            issue(n),
            FetchedIssue {
                author: String::from(author),
                date: at(n as i64 * 100),
                body: Some(String::from(body)),
                title: format!("Issue {n}"),
            },
        );
        for (cid, author, minutes, body) in comments {
            s.add_comment(
                &issue(n),
                FetchedComment {
                    id: CommentId::from(*cid),
                    author: String::from(*author),
                    date: at(*minutes),
                    body: Some(String::from(*body)),
                },
            )
            .unwrap();
        }
    }

    fn two_issues() -> MockServer {
        let mut s = MockServer::new();
        add_thread(&mut s, 1, "alice", "the widget is broken", &[
            ("c1", "bob", 150, "> the widget is broken\n\nconfirmed"),
        ]);
        add_thread(&mut s, 2, "carol", "related to the widget?", &[
            ("c2", "dave", 250, "@bob which version?"),
        ]);
        s
    }

    async fn tracking(issues: &[u64]) -> Session {
        let session = Session::default();
        session
            .lock()
            .await
            .set_tracked_issues(issues.iter().map(|n| issue(*n)));
        session
    }

    #[tokio::test]
    async fn refresh_loads_and_resolves_across_issues() {
        let mut source = two_issues();
        source.set_page_size(1);
        let session = tracking(&[1, 2]).await;
        let report = session.refresh_all(&source).await;
        assert!(!report.superseded);
        assert!(report.failed.is_empty());
        assert_eq!(report.loaded, vec![(issue(1), 2), (issue(2), 2)]);

        let state = session.lock().await;
        let ids = state.comments().iter().map(|c| &c.id.0 as &str).collect::<Vec<_>>();
        assert_eq!(ids, vec!["issue-octo-cat-1", "c1", "issue-octo-cat-2", "c2"]);
        let refs = |c: &str| state.comment(&id(c)).unwrap().references.clone();
        assert_eq!(refs("c1"), BTreeSet::from([id("issue-octo-cat-1")]));
        assert_eq!(refs("c2"), BTreeSet::from([id("c1")]));
    }

    #[tokio::test]
    async fn failing_issue_does_not_block_others() {
        let mut source = two_issues();
        source.fail_issue(issue(1), Error::RateLimited { retry_after: None });
        let session = tracking(&[1, 2, 3]).await;
        let report = session.refresh_all(&source).await;
        assert_eq!(report.loaded, vec![(issue(2), 2)]);
        assert_eq!(
            report.failed,
            vec![
                (issue(1), Error::RateLimited { retry_after: None }),
                (issue(3), Error::NotFound(issue(3))),
            ]
        );
        let state = session.lock().await;
        assert_eq!(state.comments().len(), 2);
        assert!(state.comment(&id("c2")).unwrap().references.is_empty());
    }

    #[tokio::test]
    async fn newer_refresh_supersedes_slower_one() {
        let mut slow = two_issues();
        slow.set_latency(issue(1), Duration::from_millis(300));
        let mut fast = MockServer::new();
        add_thread(&mut fast, 1, "alice", "fresh body", &[]);

        let session = tracking(&[1]).await;
        let newer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.refresh_all(&fast).await
        };
        let (old, new) = tokio::join!(session.refresh_all(&slow), newer);
        assert!(old.superseded);
        assert!(!new.superseded);

        let state = session.lock().await;
        assert_eq!(state.comments().len(), 1);
        assert_eq!(state.comments()[0].body, "fresh body");
    }

    #[tokio::test]
    async fn untracking_during_refresh_keeps_issue_out() {
        let mut source = two_issues();
        source.set_latency(issue(2), Duration::from_millis(200));
        let kv = MemoryKv::new();
        let session = tracking(&[1, 2]).await;
        let untrack = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.remove_issue(&kv, &issue(2)).await.unwrap()
        };
        let (report, removed) = tokio::join!(session.refresh_all(&source), untrack);
        assert!(removed);
        assert!(!report.superseded);
        assert_eq!(report.loaded, vec![(issue(1), 2)]);

        let state = session.lock().await;
        assert_eq!(state.tracked_issues().iter().collect::<Vec<_>>(), vec![&issue(1)]);
        let ids = state.comments().iter().map(|c| &c.id.0 as &str).collect::<Vec<_>>();
        assert_eq!(ids, vec!["issue-octo-cat-1", "c1"]);
    }

    #[tokio::test]
    async fn tracked_issues_persist() {
        let source = two_issues();
        let kv = MemoryKv::new();
        let session = Session::default();
        let report = session.add_issue(&kv, &source, issue(1)).await.unwrap();
        assert_eq!(report.unwrap().loaded, vec![(issue(1), 2)]);
        assert!(session.add_issue(&kv, &source, issue(1)).await.unwrap().is_none());
        session.add_issue(&kv, &source, issue(2)).await.unwrap();
        assert_eq!(
            kv.get(TRACKED_ISSUES_KEY).await.unwrap().as_deref(),
            Some(r#"["octo/cat#1","octo/cat#2"]"#)
        );

        session.lock().await.set_filter(Some(issue(1)));
        assert!(session.remove_issue(&kv, &issue(1)).await.unwrap());
        assert!(!session.remove_issue(&kv, &issue(1)).await.unwrap());
        {
            let state = session.lock().await;
            assert_eq!(state.active_filter(), None);
            assert!(state.comments().iter().all(|c| c.issue == issue(2)));
        }

        let restored = Session::default();
        restored.load_tracked(&kv).await.unwrap();
        assert_eq!(
            restored.lock().await.tracked_issues().iter().collect::<Vec<_>>(),
            vec![&issue(2)]
        );
    }

    #[tokio::test]
    async fn load_tracked_skips_garbage() {
        let kv = MemoryKv::new();
        kv.set(TRACKED_ISSUES_KEY, String::from(r#"["octo/cat#4","nonsense"]"#))
            .await
            .unwrap();
        let session = Session::default();
        session.load_tracked(&kv).await.unwrap();
        assert_eq!(
            session.lock().await.tracked_issues().iter().collect::<Vec<_>>(),
            vec![&issue(4)]
        );

        kv.set(TRACKED_ISSUES_KEY, String::from("{")).await.unwrap();
        assert!(session.load_tracked(&kv).await.is_err());
        assert!(Session::default().load_tracked(&MemoryKv::new()).await.is_ok());
    }

    #[tokio::test]
    async fn companies_are_looked_up() {
        let mut source = two_issues();
        source.set_company("bob", "ACME");
        let session = tracking(&[1]).await;
        session.refresh_all(&source).await;
        session.fetch_companies(&source).await;
        let state = session.lock().await;
        assert_eq!(state.company("bob"), "ACME");
        assert_eq!(state.company("alice"), "");
    }
}
