use std::path::{Path, PathBuf};

use anyhow::Context;
use crosstalk_api::{CommentId, IssueRef, MarkdownRenderer, NewComment};
use crosstalk_client::{quote, RefreshReport, Session, StateManager, View};

mod github;
mod render;
mod store;

#[derive(structopt::StructOpt)]
struct Opt {
    /// File remembering the tracked issues
    #[structopt(long, default_value = "crosstalk-state.json")]
    state_file: PathBuf,

    /// Base URL of the GitHub API
    #[structopt(long, default_value = "https://api.github.com")]
    api_base: String,

    /// Read the comments from this JSON dump instead of fetching them
    #[structopt(long)]
    dump: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Track an issue
    Track {
        /// Issue, as owner/name#number
        issue: IssueRef,
    },

    /// Stop tracking an issue
    Untrack { issue: IssueRef },

    /// List the tracked issues
    List,

    /// Print the comments of every tracked issue
    Show {
        /// Only show the comments of this issue
        #[structopt(long)]
        filter: Option<IssueRef>,

        /// Only show the comments linked to this one
        #[structopt(long)]
        select: Option<String>,

        /// Also show the comments linked to this one
        #[structopt(long, requires = "select")]
        previous: Option<String>,

        /// Comment the selected quote belongs to
        #[structopt(long, requires = "quote")]
        quote_owner: Option<String>,

        /// Highlight the comments sharing this passage
        #[structopt(long, requires = "quote-owner")]
        quote: Option<String>,

        /// Render the bodies to HTML
        #[structopt(long)]
        html: bool,
    },

    /// Print the reference graph
    Graph,

    /// Suggest where the quotes of a comment come from
    Suggest { id: String },
}

fn github_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
}

fn print_report(report: &RefreshReport) {
    for (issue, n) in report.loaded.iter() {
        eprintln!("loaded {issue}: {n} comments");
    }
    for (issue, err) in report.failed.iter() {
        eprintln!("failed loading {issue}: {err}");
    }
}

async fn load_dump(session: &Session, path: &Path) -> anyhow::Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading dump {}", path.display()))?;
    let comments: Vec<NewComment> = serde_json::from_slice(&data)
        .with_context(|| format!("parsing dump {}", path.display()))?;
    tracing::info!(comments = comments.len(), "loaded dump");
    session.lock().await.replace_all(comments);
    Ok(())
}

/// Fills the pool, from the dump if there is one and from GitHub otherwise
async fn load(session: &Session, opt: &Opt, github: &github::GithubClient) -> anyhow::Result<()> {
    if let Some(dump) = &opt.dump {
        return load_dump(session, dump).await;
    }
    print_report(&session.refresh_all(github).await);
    session.fetch_companies(github).await;
    Ok(())
}

fn comment_id(state: &StateManager, id: String) -> anyhow::Result<CommentId> {
    let id = CommentId(id);
    if state.comment(&id).is_none() {
        anyhow::bail!("unknown comment {id}");
    }
    Ok(id)
}

fn print_view(state: &StateManager, view: &View, html: bool) {
    for item in view.visible() {
        let c = &item.comment;
        let marker = match (item.is_selected, item.quote_related) {
            (true, _) => '*',
            (false, true) => '~',
            (false, false) => ' ',
        };
        let author = match state.company(&c.author) {
            "" => c.author.clone(),
            company => format!("{} ({company})", c.author),
        };
        println!(
            "{marker} [{}] {author}, {} on {} \"{}\"",
            c.id,
            c.date.format("%Y-%m-%d %H:%M"),
            c.issue,
            c.issue_title
        );
        let body = match html {
            true => render::CmarkRenderer.render(&c.body),
            false => c.body.clone(),
        };
        for line in body.lines() {
            println!("    {line}");
        }
        for (r, snippet) in state.reference_snippets(&c.id) {
            println!("    -> {r}: {snippet}");
        }
        println!();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let kv = store::JsonFileKv::new(&opt.state_file);
    let github = github::GithubClient::new(&opt.api_base, github_token())?;
    let session = Session::default();
    session.load_tracked(&kv).await?;

    match &opt.cmd {
        Command::Track { issue } => match &opt.dump {
            Some(_) => {
                if session.lock().await.track_issue(issue.clone()) {
                    session.save_tracked(&kv).await?;
                }
            }
            None => match session.add_issue(&kv, &github, issue.clone()).await? {
                Some(report) => print_report(&report),
                None => eprintln!("{issue} is already tracked"),
            },
        },
        Command::Untrack { issue } => {
            if !session.remove_issue(&kv, issue).await? {
                eprintln!("{issue} was not tracked");
            }
        }
        Command::List => {
            for issue in session.lock().await.tracked_issues() {
                println!("{issue}");
            }
        }
        Command::Show {
            filter,
            select,
            previous,
            quote_owner,
            quote,
            html,
        } => {
            load(&session, &opt, &github).await?;
            let mut state = session.lock().await;
            state.set_filter(filter.clone());
            if let Some(previous) = previous {
                let previous = comment_id(&state, previous.clone())?;
                state.select(Some(previous));
            }
            if let Some(select) = select {
                let select = comment_id(&state, select.clone())?;
                state.select(Some(select));
            }
            if let (Some(owner), Some(text)) = (quote_owner, quote) {
                let owner = comment_id(&state, owner.clone())?;
                state.select_quote(owner, Some(text.clone()));
            }
            print_view(&state, &state.get_view(), *html);
        }
        Command::Graph => {
            load(&session, &opt, &github).await?;
            let state = session.lock().await;
            let graph = state.graph();
            for c in state.comments() {
                let refs = c.references.iter().map(|r| r.0.as_str()).collect::<Vec<_>>();
                let linked = graph.neighbors(&c.id).map(|n| n.0.as_str()).collect::<Vec<_>>();
                println!(
                    "{} ({}): references [{}], linked to [{}], cluster of {}",
                    c.id,
                    c.author,
                    refs.join(", "),
                    linked.join(", "),
                    graph.closure([&c.id]).len()
                );
            }
        }
        Command::Suggest { id } => {
            load(&session, &opt, &github).await?;
            let state = session.lock().await;
            let id = CommentId(id.clone());
            let c = state
                .comment(&id)
                .with_context(|| format!("unknown comment {id}"))?;
            let quotes = quote::quote_blocks(&c.body);
            if quotes.is_empty() {
                println!("{id} quotes nothing");
            }
            for q in quotes {
                let pool = state.comments().iter().map(|p| &**p);
                match quote::best_source(&q, c, pool) {
                    Some(src) => println!(
                        "{:?} most likely comes from {} by {} (score {:.2})",
                        q.text(),
                        src.id,
                        src.author,
                        quote::score(&q, c, src)
                    ),
                    None => println!("{:?} has no likely source", q.text()),
                }
            }
        }
    }

    Ok(())
}
