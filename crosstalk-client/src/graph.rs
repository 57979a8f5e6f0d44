use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::{api::CommentId, Comment};

/// Reference edges of a pool, walked in both directions
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReferenceGraph {
    adjacency: HashMap<CommentId, BTreeSet<CommentId>>,
}

impl ReferenceGraph {
    pub fn build<'a, I>(comments: I) -> ReferenceGraph
    where
        I: IntoIterator<Item = &'a Comment>,
    {
        let comments = comments.into_iter().collect::<Vec<_>>();
        let mut adjacency = comments
            .iter()
            .map(|c| (c.id.clone(), BTreeSet::new()))
            .collect::<HashMap<_, _>>();
        for c in comments {
            for r in c.references.iter() {
                if *r == c.id || !adjacency.contains_key(r) {
                    tracing::warn!(from = %c.id, to = %r, "dropping reference edge to unknown comment");
                    continue;
                }
                adjacency
                    .get_mut(&c.id)
                    .expect("every comment id was inserted above")
                    .insert(r.clone());
                adjacency
                    .get_mut(r)
                    .expect("edge target was checked above")
                    .insert(c.id.clone());
            }
        }
        ReferenceGraph { adjacency }
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Comments `id` references, and comments referencing `id`
    pub fn neighbors<'a>(&'a self, id: &CommentId) -> impl 'a + Iterator<Item = &'a CommentId> {
        self.adjacency.get(id).into_iter().flat_map(|n| n.iter())
    }

    /// Every comment reachable from `seeds`, seeds included
    ///
    /// Seeds that are not in the graph are ignored.
    pub fn closure<'a, I>(&self, seeds: I) -> BTreeSet<CommentId>
    where
        I: IntoIterator<Item = &'a CommentId>,
    {
        let mut visited = BTreeSet::new();
        let mut queue = seeds
            .into_iter()
            .filter(|s| self.contains(s))
            .cloned()
            .collect::<VecDeque<_>>();
        while let Some(id) = queue.pop_front() {
            if visited.contains(&id) {
                continue;
            }
            queue.extend(self.neighbors(&id).filter(|n| !visited.contains(*n)).cloned());
            visited.insert(id);
        }
        visited
    }

    /// The cluster of `selected`, plus the cluster of the previous selection if any
    pub fn closure_with_previous(
        &self,
        selected: &CommentId,
        previous: Option<&CommentId>,
    ) -> BTreeSet<CommentId> {
        let mut res = self.closure([selected]);
        if let Some(previous) = previous {
            if !res.contains(previous) {
                res.extend(self.closure([previous]));
            }
        }
        res
    }
}
