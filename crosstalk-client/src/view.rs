use std::{collections::BTreeSet, sync::Arc};

use crate::{
    api::{CommentId, IssueRef},
    quote::{self, QuoteBlock},
    Comment, ReferenceGraph,
};

/// A passage of a comment the user picked
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectedQuote {
    pub owner: CommentId,
    pub text: String,
}

/// Everything that decides which comments are shown
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ViewQuery {
    pub filter: Option<IssueRef>,
    pub selected: Option<CommentId>,
    pub previous: Option<CommentId>,
    pub quote: Option<SelectedQuote>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ViewItem {
    pub comment: Arc<Comment>,
    pub filtered: bool,
    pub quote_related: bool,

    /// This is the selected comment itself
    pub is_selected: bool,
}

/// The pool, in order, annotated with display flags
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct View {
    pub items: Vec<ViewItem>,
}

impl View {
    pub fn visible(&self) -> impl Iterator<Item = &ViewItem> {
        self.items.iter().filter(|i| !i.filtered)
    }

    pub fn get(&self, id: &CommentId) -> Option<&ViewItem> {
        self.items.iter().find(|i| i.comment.id == *id)
    }
}

impl ViewQuery {
    /// Computes the flags of every comment, from scratch
    ///
    /// An active filter wins over the selection, and the selection wins over a
    /// selected quote.
    pub fn compute(&self, comments: &[Arc<Comment>], graph: &ReferenceGraph) -> View {
        let mut items = comments
            .iter()
            .map(|c| ViewItem {
                comment: c.clone(),
                filtered: false,
                quote_related: false,
                is_selected: false,
            })
            .collect::<Vec<_>>();

        if let Some(filter) = &self.filter {
            for i in items.iter_mut() {
                i.filtered = i.comment.issue != *filter;
            }
        } else if let Some(selected) = &self.selected {
            let visible = graph.closure_with_previous(selected, self.previous.as_ref());
            for i in items.iter_mut() {
                i.filtered = !visible.contains(&i.comment.id);
                i.is_selected = i.comment.id == *selected;
            }
        } else if let Some(quote) = &self.quote {
            let related = quote_related(comments, quote);
            for i in items.iter_mut() {
                i.quote_related = related.contains(&i.comment.id);
            }
        }

        View { items }
    }
}

/// Comments sharing text with a selected quote, judged on the live bodies
fn quote_related(comments: &[Arc<Comment>], quote: &SelectedQuote) -> BTreeSet<CommentId> {
    let mut res = BTreeSet::new();
    let Some(owner) = comments.iter().find(|c| c.id == quote.owner) else {
        tracing::debug!(owner = %quote.owner, "selected quote belongs to an unknown comment");
        return res;
    };
    res.insert(owner.id.clone());

    let text = QuoteBlock::parse(&quote.text)
        .map(|q| quote::normalize(&q.text()))
        .unwrap_or_default();
    if text.is_empty() {
        return res;
    }
    let owner_body = quote::normalize(&owner.body);

    for c in comments {
        if quote::normalize(&c.body).contains(&text) {
            res.insert(c.id.clone());
            continue;
        }
        let quotes_owner = quote::quote_blocks(&c.body).iter().any(|q| {
            let q = quote::normalize(&q.text());
            !q.is_empty() && owner_body.contains(&q)
        });
        if quotes_owner {
            res.insert(c.id.clone());
        }
    }
    res
}
