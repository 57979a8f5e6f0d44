#![cfg(test)]

use std::collections::BTreeSet;

use crate::{api::NewComment, resolve, testing::*, StateManager};

const AUTHORS: &[&str] = &["alice", "Bob", "carol", "dave"];
const PHRASES: &[&str] = &[
    "the build is broken",
    "works for me",
    "the build is broken on main\nplease revert",
    "can you share the logs?",
    "works for me",
];
const MAX_COMMENTS: usize = 40;

macro_rules! do_test {
    ( $name:ident, $fn:expr ) => {
        #[test]
        fn $name() {
            bolero::check!()
                .with_type::<Vec<(u8, u8, u8, u8)>>()
                .for_each(|ops: &Vec<(u8, u8, u8, u8)>| {
                    let comments = gen_comments(ops);
                    let () = $fn(comments);
                })
        }
    };
}

/// Turns fuzzer input into a small thread full of quotes and mentions
///
/// Dates collide often, so the arrival order matters.
fn gen_comments(ops: &[(u8, u8, u8, u8)]) -> Vec<NewComment> {
    ops.iter()
        .take(MAX_COMMENTS)
        .enumerate()
        .map(|(i, &(author, minute, kind, target))| {
            let phrase = PHRASES[usize::from(target) % PHRASES.len()];
            let handle = AUTHORS[usize::from(target) % AUTHORS.len()].to_lowercase();
            let body = match kind % 4 {
                0 => String::from(phrase),
                1 => format!("> {}\n\nindeed", phrase.replace('\n', "\n> ")),
                2 => format!("@{handle} any news?"),
                _ => format!("> {phrase}\n\n@{handle} see above"),
            };
            new_comment_in(
                u64::from(target % 3) + 1,
                &format!("c{i}"),
                AUTHORS[usize::from(author) % AUTHORS.len()],
                i64::from(minute % 16),
                &body,
            )
        })
        .collect()
}

fn loaded(comments: Vec<NewComment>) -> StateManager {
    let mut s = StateManager::new();
    s.replace_all(comments);
    s
}

do_test!(fuzz_references_point_backwards, |comments| {
    let s = loaded(comments);
    for c in s.comments() {
        for r in c.references.iter() {
            let target = s
                .comment(r)
                .unwrap_or_else(|| panic!("{} references unknown {r}", c.id));
            assert!(target.is_before(c), "{} references later {r}", c.id);
        }
    }
});

do_test!(fuzz_resolution_is_idempotent, |comments| {
    let s = loaded(comments);
    for c in s.comments() {
        assert_eq!(
            resolve::references(c, s.comments()),
            c.references,
            "resolving {} again changed its references",
            c.id
        );
    }
});

do_test!(fuzz_closure_is_a_fixed_point, |comments| {
    let s = loaded(comments);
    let g = s.graph();
    for c in s.comments() {
        let cluster = g.closure([&c.id]);
        assert!(cluster.contains(&c.id));
        for member in cluster.iter() {
            assert_eq!(
                g.closure([member]),
                cluster,
                "clusters of {} and {member} differ",
                c.id
            );
        }
    }
});

do_test!(fuzz_append_in_chunks_matches_batch, |comments: Vec<NewComment>| {
    let batch = loaded(comments.clone());
    let mut chunked = StateManager::new();
    for chunk in comments.chunks(3) {
        chunked.append(chunk.to_vec());
    }
    let summary = |s: &StateManager| {
        s.comments()
            .iter()
            .map(|c| (c.id.clone(), c.references.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&batch), summary(&chunked));
});

do_test!(fuzz_removing_issue_leaves_no_dangling_edge, |comments| {
    let mut s = loaded(comments);
    s.remove_issue(&issue(2));
    let ids = s.comments().iter().map(|c| c.id.clone()).collect::<BTreeSet<_>>();
    for c in s.comments() {
        assert_ne!(c.issue, issue(2));
        assert!(c.references.is_subset(&ids));
    }
});
