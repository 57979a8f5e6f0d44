use chrono::{Duration, TimeZone};
use crosstalk_api::{CommentId, IssueRef, NewComment};
use rand::{seq::SliceRandom, Rng};

const REPO: &str = "example/project";
const NUM_ISSUES: u64 = 3;
const NUM_COMMENTS: usize = 120;
const USERS: &[&str] = &["alice", "bob", "carol", "dave", "erin", "frank"];

const PARAGRAPHS: std::ops::RangeInclusive<usize> = 1..=3;
const PARAGRAPH_WORDS: std::ops::RangeInclusive<usize> = 6..=30;
const MAX_GAP_MINUTES: i64 = 180;

const QUOTE_PROBABILITY: f64 = 0.35;
const MENTION_PROBABILITY: f64 = 0.2;

fn gen_paragraphs(rng: &mut impl Rng) -> Vec<String> {
    (0..rng.gen_range(PARAGRAPHS))
        .map(|_| lipsum::lipsum_words(rng.gen_range(PARAGRAPH_WORDS)))
        .collect()
}

fn issue(n: u64) -> IssueRef {
    IssueRef::new(REPO, n).expect("generated issue ref is valid")
}

fn main() {
    let mut rng = rand::thread_rng();
    let mut date = chrono::Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("start date is valid");
    let mut comments: Vec<NewComment> = Vec::new();

    // original posts first
    for n in 1..=NUM_ISSUES {
        let title = lipsum::lipsum_title();
        comments.push(NewComment {
            id: CommentId::original_post(&issue(n)),
            author: String::from(*USERS.choose(&mut rng).expect("USERS is not empty")),
            date,
            body: gen_paragraphs(&mut rng).join("\n\n"),
            issue: issue(n),
            issue_title: title,
            is_original_post: true,
        });
        date = date + Duration::minutes(rng.gen_range(1..=MAX_GAP_MINUTES));
    }

    for i in 0..NUM_COMMENTS {
        let n = rng.gen_range(1..=NUM_ISSUES);
        let mut parts = Vec::new();
        if rng.gen_bool(QUOTE_PROBABILITY) {
            let quoted = comments.choose(&mut rng).expect("original posts exist");
            let passages = quoted.body.split("\n\n").collect::<Vec<_>>();
            let passage = passages.choose(&mut rng).expect("split yields one passage");
            parts.push(format!("> {}", passage.replace('\n', "\n> ")));
        }
        let mut reply = gen_paragraphs(&mut rng);
        if rng.gen_bool(MENTION_PROBABILITY) {
            let mentioned = comments.choose(&mut rng).expect("original posts exist");
            reply[0] = format!("@{} {}", mentioned.author, reply[0]);
        }
        parts.extend(reply);

        comments.push(NewComment {
            id: CommentId(format!("{}", 1_000_000 + i)),
            author: String::from(*USERS.choose(&mut rng).expect("USERS is not empty")),
            date,
            body: parts.join("\n\n"),
            issue: issue(n),
            issue_title: comments
                .iter()
                .find(|c| c.is_original_post && c.issue == issue(n))
                .map(|c| c.issue_title.clone())
                .unwrap_or_default(),
            is_original_post: false,
        });
        date = date + Duration::minutes(rng.gen_range(0..=MAX_GAP_MINUTES));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&comments).expect("serializing test data")
    );
}
