use std::{collections::BTreeSet, sync::Arc};

use regex::Regex;

use crate::{
    api::CommentId,
    quote::{self, QuoteBlock},
    Comment,
};

lazy_static::lazy_static! {
    static ref MENTION: Regex = Regex::new(r"@([A-Za-z0-9-]+)").expect("mention regex is valid");
}

/// `@handle` mentions of `body`, without the `@`, first occurrence first
pub fn mentions(body: &str) -> Vec<&str> {
    let mut res: Vec<&str> = Vec::new();
    for cap in MENTION.captures_iter(body) {
        let Some(handle) = cap.get(1) else { continue };
        if !res.contains(&handle.as_str()) {
            res.push(handle.as_str());
        }
    }
    res
}

/// The earlier comment of `pool` that `quote` was taken from, if any
pub fn quote_source<'a>(
    c: &Comment,
    quote: &QuoteBlock,
    pool: &'a [Arc<Comment>],
) -> Option<&'a Comment> {
    let candidates = pool
        .iter()
        .map(|p| &**p)
        .filter(|p| p.is_before(c) && quote::contains_quote(&p.body, quote))
        .collect::<Vec<_>>();
    match candidates.len() {
        0 => None,
        1 => Some(candidates[0]),
        _ => quote::rank(quote, c, candidates),
    }
}

/// The latest comment by `handle` posted before `c`
pub fn mention_target<'a>(c: &Comment, handle: &str, pool: &'a [Arc<Comment>]) -> Option<&'a Comment> {
    pool.iter()
        .map(|p| &**p)
        .filter(|p| p.is_before(c) && p.author.eq_ignore_ascii_case(handle))
        .max_by_key(|p| p.position())
}

/// Everything `c` quotes or mentions among the comments of `pool`
///
/// This is the complete reference set of `c`: callers replace the previous one with it.
pub fn references(c: &Comment, pool: &[Arc<Comment>]) -> BTreeSet<CommentId> {
    let mut res = BTreeSet::new();

    for quote in quote::quote_blocks(&c.body) {
        match quote_source(c, &quote, pool) {
            Some(src) => {
                res.insert(src.id.clone());
            }
            None => tracing::debug!(comment = %c.id, quote = %quote.text(), "unmatched quote"),
        }
    }

    for handle in mentions(&c.body) {
        match mention_target(c, handle, pool) {
            Some(target) => {
                res.insert(target.id.clone());
            }
            None => tracing::debug!(comment = %c.id, handle, "mention without earlier comment"),
        }
    }

    res
}
