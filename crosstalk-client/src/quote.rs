use crate::Comment;

/// Candidates scoring at most this are never suggested as a source
pub const MIN_SCORE: f64 = 0.1;

const CLOSE_LENGTH_CHARS: f64 = 10.0;
const CLOSE_LENGTH_BONUS: f64 = 1.5;
const CLOSE_TIME_HOURS: i64 = 24;
const CLOSE_TIME_BONUS: f64 = 1.2;
const AUTHOR_NAMED_BONUS: f64 = 1.3;
const LINE_START_BONUS: f64 = 1.1;

/// A quoted passage, with its blockquote markers stripped
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuoteBlock {
    lines: Vec<String>,
}

impl QuoteBlock {
    /// Strips the markers and surrounding whitespace of every line of `text`
    ///
    /// Returns `None` if nothing is left.
    pub fn parse(text: &str) -> Option<QuoteBlock> {
        let mut lines = text.lines().map(strip_markers).collect::<Vec<_>>();
        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        let first_content = lines.iter().position(|l| !l.is_empty())?;
        lines.drain(..first_content);
        Some(QuoteBlock {
            lines: lines.into_iter().map(String::from).collect(),
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

fn is_quote_line(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

fn strip_markers(line: &str) -> &str {
    let mut line = line.trim_start();
    while let Some(rest) = line.strip_prefix('>') {
        line = rest.trim_start();
    }
    line.trim_end()
}

/// Every maximal run of blockquoted lines of `body` that has some content
pub fn quote_blocks(body: &str) -> Vec<QuoteBlock> {
    let mut res = Vec::new();
    let mut current = Vec::new();
    for line in body.lines() {
        if is_quote_line(line) {
            current.push(line);
            continue;
        }
        if !current.is_empty() {
            res.extend(QuoteBlock::parse(&current.join("\n")));
            current.clear();
        }
    }
    if !current.is_empty() {
        res.extend(QuoteBlock::parse(&current.join("\n")));
    }
    res
}

/// Whether some contiguous run of the trimmed lines of `body` is exactly `quote`
pub fn contains_quote(body: &str, quote: &QuoteBlock) -> bool {
    let lines = body.lines().map(str::trim).collect::<Vec<_>>();
    let quote = quote.lines();
    if quote.is_empty() || quote.len() > lines.len() {
        return false;
    }
    lines
        .windows(quote.len())
        .any(|w| w.iter().zip(quote).all(|(l, q)| *l == q))
}

/// Drops emphasis markers, collapses whitespace and lowercases
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.replace(['*', '_', '`'], ""))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How likely `candidate` is the source of `quote`, as quoted by `quoting`
///
/// Zero when the normalized candidate does not contain the normalized quote.
pub fn score(quote: &QuoteBlock, quoting: &Comment, candidate: &Comment) -> f64 {
    let q = normalize(&quote.text());
    let c = normalize(&candidate.body);
    if q.is_empty() || !c.contains(&q) {
        return 0.0;
    }

    let q_len = q.chars().count() as f64;
    let c_len = c.chars().count() as f64;
    let mut res = q_len / c_len;

    if (c_len - q_len).abs() < CLOSE_LENGTH_CHARS {
        res *= CLOSE_LENGTH_BONUS;
    }

    let elapsed = quoting.date.signed_duration_since(candidate.date);
    if elapsed.num_seconds().abs() <= CLOSE_TIME_HOURS * 3600 {
        res *= CLOSE_TIME_BONUS;
    }

    let login = normalize(&candidate.author);
    if !login.is_empty() && q.contains(&login) {
        res *= AUTHOR_NAMED_BONUS;
    }

    let first = quote.lines().first().map(|l| normalize(l)).unwrap_or_default();
    if !first.is_empty()
        && candidate
            .body
            .lines()
            .any(|l| normalize(l).starts_with(&first))
    {
        res *= LINE_START_BONUS;
    }

    res
}

/// The highest-scoring candidate, ties going to the most recent one
///
/// Unlike [`best_source`], no candidate is excluded for scoring low.
pub fn rank<'a, I>(quote: &QuoteBlock, quoting: &Comment, candidates: I) -> Option<&'a Comment>
where
    I: IntoIterator<Item = &'a Comment>,
{
    candidates
        .into_iter()
        .map(|c| (score(quote, quoting, c), c))
        .max_by(|(sa, a), (sb, b)| sa.total_cmp(sb).then(a.position().cmp(&b.position())))
        .map(|(_, c)| c)
}

/// The most likely source of `quote` among the comments of `pool` earlier than `quoting`
pub fn best_source<'a, I>(quote: &QuoteBlock, quoting: &Comment, pool: I) -> Option<&'a Comment>
where
    I: IntoIterator<Item = &'a Comment>,
{
    pool.into_iter()
        .filter(|c| c.is_before(quoting))
        .map(|c| (score(quote, quoting, c), c))
        .filter(|(s, _)| *s > MIN_SCORE)
        .max_by(|(sa, a), (sb, b)| sa.total_cmp(sb).then(a.position().cmp(&b.position())))
        .map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment, comment_by};

    fn block(text: &str) -> QuoteBlock {
        QuoteBlock::parse(text).unwrap()
    }

    #[test]
    fn blocks_are_maximal_runs() {
        let body = "intro\n> first\n>second\n\nmiddle\n  > > third\n>\n> fourth\nend\n> \n>";
        let blocks = quote_blocks(body);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines(), ["first", "second"]);
        assert_eq!(blocks[1].lines(), ["third", "", "fourth"]);
    }

    #[test]
    fn empty_body_has_no_blocks() {
        assert!(quote_blocks("").is_empty());
        assert!(quote_blocks("no quote here").is_empty());
        assert_eq!(QuoteBlock::parse(">\n> \n"), None);
    }

    #[test]
    fn exact_match_needs_contiguous_lines() {
        let body = "line1\n  line2  \nline3";
        assert!(contains_quote(body, &block("> line1\n> line2")));
        assert!(contains_quote(body, &block("line2\nline3")));
        assert!(!contains_quote(body, &block("> line1\n> line3")));
        assert!(!contains_quote(body, &block("> line")));
        assert!(!contains_quote(body, &block("line1\nline2\nline3\nline4")));
        assert!(!contains_quote("> line1\n> line2", &block("> line1\n> line2")));
    }

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize("  **Hello**\n\t_World_  `code` "), "hello world code");
        assert_eq!(normalize("* * *"), "");
    }

    #[test]
    fn score_zero_when_not_contained() {
        let src = comment("a", 0, "something else");
        let quoting = comment("b", 1, "> hello");
        assert_eq!(score(&block("hello"), &quoting, &src), 0.0);
    }

    #[test]
    fn score_bonuses() {
        // identical length, same day, starts a line: 1 * 1.5 * 1.2 * 1.1
        let src = comment_by("a", "zed", 0, "Hello *there*");
        let quoting = comment("b", 60, "> hello there");
        let s = score(&block("hello there"), &quoting, &src);
        assert!((s - 1.5 * 1.2 * 1.1).abs() < 1e-9, "got {s}");

        // naming the author
        let src = comment_by("a", "zed", 0, "zed says hi");
        let s = score(&block("zed says hi"), &quoting, &src);
        assert!((s - 1.5 * 1.2 * 1.3 * 1.1).abs() < 1e-9, "got {s}");

        // more than a day apart
        let quoting = comment("b", 60 * 25, "> zed says hi");
        let s = score(&block("zed says hi"), &quoting, &src);
        assert!((s - 1.5 * 1.3 * 1.1).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn best_source_prefers_tighter_match() {
        let long = comment("long", 0, &format!("the answer is 42\n{}", "filler ".repeat(20)));
        let short = comment("short", 1, "the answer is 42");
        let quoting = comment("q", 2, "> the answer is 42");
        let pool = [&long, &short, &quoting];
        let quote = block("the answer is 42");
        assert_eq!(
            best_source(&quote, &quoting, pool.iter().copied()).map(|c| &c.id),
            Some(&short.id)
        );
    }

    #[test]
    fn best_source_ties_go_to_most_recent() {
        let a = comment("a", 0, "same text");
        let b = comment("b", 1, "same text");
        let later = comment("later", 5, "same text");
        let quoting = comment("q", 2, "> same text");
        let pool = [&a, &b, &later, &quoting];
        assert_eq!(
            best_source(&block("same text"), &quoting, pool.iter().copied()).map(|c| &c.id),
            Some(&b.id)
        );
    }

    #[test]
    fn best_source_excludes_low_scores() {
        let src = comment("a", 0, &format!("ok {}", "word ".repeat(50)));
        let quoting = comment("q", 1, "> ok");
        assert!(best_source(&block("ok"), &quoting, [&src]).is_none());
        assert_eq!(rank(&block("ok"), &quoting, [&src]).map(|c| &c.id), Some(&src.id));
    }
}
