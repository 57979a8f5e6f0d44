use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use crate::{
    api::{CommentId, FetchedComment, FetchedIssue, IssueRef, NewComment},
    resolve, Comment, ReferenceGraph, SelectedQuote, View, ViewQuery,
};

pub type SubscriptionId = u64;

type Subscriber = Box<dyn Fn(&StateManager) + Send + Sync>;

/// Owner of the comment pool and of everything derived from it
///
/// Every mutation re-sorts the pool, re-derives every reference set, then
/// notifies the subscribers once.
pub struct StateManager {
    comments: Vec<Arc<Comment>>,
    graph: ReferenceGraph,
    tracked: BTreeSet<IssueRef>,
    companies: HashMap<String, String>,
    query: ViewQuery,
    next_seq: u64,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_subscription: SubscriptionId,
}

impl Default for StateManager {
    fn default() -> StateManager {
        StateManager::new()
    }
}

impl StateManager {
    pub fn new() -> StateManager {
        StateManager {
            comments: Vec::new(),
            graph: ReferenceGraph::default(),
            tracked: BTreeSet::new(),
            companies: HashMap::new(),
            query: ViewQuery::default(),
            next_seq: 0,
            subscribers: BTreeMap::new(),
            next_subscription: 0,
        }
    }

    /// The pool, oldest first
    pub fn comments(&self) -> &[Arc<Comment>] {
        &self.comments
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Arc<Comment>> {
        self.comments.iter().find(|c| c.id == *id)
    }

    pub fn graph(&self) -> &ReferenceGraph {
        &self.graph
    }

    pub fn tracked_issues(&self) -> &BTreeSet<IssueRef> {
        &self.tracked
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn active_filter(&self) -> Option<&IssueRef> {
        self.query.filter.as_ref()
    }

    pub fn company(&self, login: &str) -> &str {
        self.companies.get(login).map(|c| c as &str).unwrap_or("")
    }

    pub fn get_view(&self) -> View {
        self.query.compute(&self.comments, &self.graph)
    }

    /// Referenced ids of `id` with a short excerpt of each
    pub fn reference_snippets(&self, id: &CommentId) -> Vec<(CommentId, String)> {
        let Some(c) = self.comment(id) else {
            return Vec::new();
        };
        c.references
            .iter()
            .map(|r| {
                let snippet = self
                    .comment(r)
                    .map(|rc| rc.snippet())
                    .unwrap_or_else(|| String::from("unknown comment"));
                (r.clone(), snippet)
            })
            .collect()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: 'static + Fn(&StateManager) + Send + Sync,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.insert(id, Box::new(callback));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    fn notify(&self) {
        for s in self.subscribers.values() {
            s(self);
        }
    }

    /// Returns false if the issue was already tracked
    pub fn track_issue(&mut self, issue: IssueRef) -> bool {
        if !self.tracked.insert(issue) {
            return false;
        }
        self.notify();
        true
    }

    pub fn set_tracked_issues<I>(&mut self, issues: I)
    where
        I: IntoIterator<Item = IssueRef>,
    {
        self.tracked = issues.into_iter().collect();
        self.notify();
    }

    pub fn set_companies<I>(&mut self, companies: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.companies.extend(companies);
        self.notify();
    }

    /// Replaces the whole pool
    pub fn replace_all(&mut self, comments: Vec<NewComment>) {
        self.comments.clear();
        self.insert(comments);
        self.refresh_all();
        self.notify();
    }

    /// Merges `comments` into the pool
    ///
    /// Every comment is resolved again, as a newly merged early comment can be
    /// the source of a quote or mention from one that was already there.
    pub fn append(&mut self, comments: Vec<NewComment>) {
        self.insert(comments);
        self.refresh_all();
        self.notify();
    }

    /// Merges the original post and the comments of one issue
    pub fn append_issue(&mut self, issue: &IssueRef, i: FetchedIssue, comments: Vec<FetchedComment>) {
        self.append(NewComment::thread(issue, i, comments));
    }

    /// Stops tracking `issue` and drops its comments, along with every edge
    /// from or to them
    pub fn remove_issue(&mut self, issue: &IssueRef) -> bool {
        let was_tracked = self.tracked.remove(issue);
        let len_before = self.comments.len();
        self.comments.retain(|c| c.issue != *issue);
        let removed_comments = self.comments.len() != len_before;
        if !was_tracked && !removed_comments {
            return false;
        }
        if self.query.filter.as_ref() == Some(issue) {
            self.query.filter = None;
        }
        self.refresh_all();
        self.notify();
        true
    }

    pub fn set_filter(&mut self, filter: Option<IssueRef>) {
        self.query.filter = filter;
        self.notify();
    }

    /// Selects a comment, remembering the previously selected one
    ///
    /// Selecting `None` forgets both.
    pub fn select(&mut self, id: Option<CommentId>) {
        match id {
            None => {
                self.query.selected = None;
                self.query.previous = None;
            }
            Some(id) if self.comment(&id).is_none() => {
                tracing::warn!(%id, "ignoring selection of unknown comment");
                return;
            }
            Some(id) => {
                if let Some(current) = self.query.selected.take() {
                    if current != id {
                        self.query.previous = Some(current);
                    }
                }
                self.query.selected = Some(id);
            }
        }
        self.notify();
    }

    /// Selects `text` as quoted by `owner`, or clears the quote selection if `text` is `None`
    pub fn select_quote(&mut self, owner: CommentId, text: Option<String>) {
        self.query.quote = text.map(|text| SelectedQuote { owner, text });
        self.notify();
    }

    fn insert(&mut self, comments: Vec<NewComment>) {
        let mut known = self
            .comments
            .iter()
            .map(|c| c.id.clone())
            .collect::<HashSet<_>>();
        for c in comments {
            if c.id.0.is_empty() || c.author.is_empty() {
                tracing::warn!(id = %c.id, issue = %c.issue, "dropping malformed comment");
                continue;
            }
            if !known.insert(c.id.clone()) {
                tracing::warn!(id = %c.id, issue = %c.issue, "dropping comment with duplicate id");
                continue;
            }
            self.comments.push(Arc::new(Comment::new(c, self.next_seq)));
            self.next_seq += 1;
        }
        self.comments.sort_by_key(|c| c.position());
    }

    /// Re-derives every reference set and the graph from the current pool
    fn refresh_all(&mut self) {
        let refs = self
            .comments
            .iter()
            .map(|c| resolve::references(c, &self.comments))
            .collect::<Vec<_>>();
        for (c, r) in self.comments.iter_mut().zip(refs) {
            if c.references != r {
                Arc::make_mut(c).references = r;
            }
        }
        self.graph = ReferenceGraph::build(self.comments.iter().map(|c| &**c));
        self.forget_removed_selection();
        tracing::debug!(
            comments = self.comments.len(),
            edges = self.comments.iter().map(|c| c.references.len()).sum::<usize>(),
            "resolved references"
        );
    }

    fn forget_removed_selection(&mut self) {
        let graph = &self.graph;
        let gone = |id: &Option<CommentId>| id.as_ref().map(|id| !graph.contains(id)).unwrap_or(false);
        if gone(&self.query.selected) {
            self.query.selected = self.query.previous.take().filter(|p| graph.contains(p));
        }
        if gone(&self.query.previous) {
            self.query.previous = None;
        }
        if let Some(q) = &self.query.quote {
            if !graph.contains(&q.owner) {
                self.query.quote = None;
            }
        }
    }
}
