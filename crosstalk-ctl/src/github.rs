use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use crosstalk_api::{
    CommentId, Error, FetchedComment, FetchedIssue, IssueRef, IssueSource, Time, UserDirectory,
};
use http::{header, HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

const PER_PAGE: usize = 100;
const TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const USER_AGENT: &str = concat!("crosstalk/", env!("CARGO_PKG_VERSION"));

#[derive(serde::Deserialize)]
struct GhUser {
    login: String,
}

#[derive(serde::Deserialize)]
struct GhIssue {
    title: String,
    user: Option<GhUser>,
    created_at: Time,
    body: Option<String>,
}

#[derive(serde::Deserialize)]
struct GhComment {
    id: u64,
    user: Option<GhUser>,
    created_at: Time,
    body: Option<String>,
}

#[derive(serde::Deserialize)]
struct GhProfile {
    company: Option<String>,
}

/// Deleted accounts come back without a user
fn login(user: Option<GhUser>) -> String {
    user.map(|u| u.login)
        .unwrap_or_else(|| String::from("ghost"))
}

impl From<GhIssue> for FetchedIssue {
    fn from(i: GhIssue) -> FetchedIssue {
        FetchedIssue {
            author: login(i.user),
            date: i.created_at,
            body: i.body,
            title: i.title,
        }
    }
}

impl From<GhComment> for FetchedComment {
    fn from(c: GhComment) -> FetchedComment {
        FetchedComment {
            id: CommentId(c.id.to_string()),
            author: login(c.user),
            date: c.created_at,
            body: c.body,
        }
    }
}

/// Client for the GitHub REST API
pub struct GithubClient {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(base: &str, token: Option<String>) -> anyhow::Result<GithubClient> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(GithubClient {
            client,
            base: String::from(base.trim_end_matches('/')),
            token,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_once(&self, url: &str, issue: &IssueRef) -> Result<reqwest::Response, Error> {
        let resp = self
            .request(url)
            .send()
            .await
            .map_err(|e| transport_error(e, issue))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let retry_after = retry_after(resp.headers(), chrono::Utc::now());
        Err(Error::from_status(status, issue, retry_after))
    }

    /// GETs `url`, retrying transient failures with exponential backoff
    async fn get(&self, url: &str, issue: &IssueRef) -> Result<reqwest::Response, Error> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, issue).await {
                Err(err) if err.is_retryable() && attempt < MAX_RETRIES => {
                    let delay = RETRY_DELAY * 2u32.pow(attempt);
                    tracing::warn!(%issue, %err, attempt, ?delay, "retrying github request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                res => return res,
            }
        }
    }

    async fn profile(&self, login: &str) -> anyhow::Result<GhProfile> {
        let url = format!("{}/users/{login}", self.base);
        let resp = self
            .request(&url)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()?;
        resp.json().await.context("decoding user profile")
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> Result<T, Error> {
    resp.json()
        .await
        .map_err(|e| Error::Unknown(format!("decoding answer to {url}: {e}")))
}

fn transport_error(err: reqwest::Error, issue: &IssueRef) -> Error {
    if err.is_timeout() {
        return Error::Network {
            status: StatusCode::REQUEST_TIMEOUT.as_u16(),
        };
    }
    Error::Unknown(format!("requesting {issue}: {err}"))
}

/// How long until the rate limit resets, if the response says it is exhausted
fn retry_after(headers: &HeaderMap, now: Time) -> Option<Duration> {
    let number = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };
    let secs = |s: i64| Duration::from_secs(u64::try_from(s).unwrap_or(0));
    if let Some(s) = number("retry-after") {
        return Some(secs(s));
    }
    if number("x-ratelimit-remaining") != Some(0) {
        return None;
    }
    Some(secs(
        number("x-ratelimit-reset")
            .map(|reset| reset - now.timestamp())
            .unwrap_or(0),
    ))
}

/// The `rel="next"` target of a `Link` header
fn next_page(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (url, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let url = url.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(String::from(url))
    })
}

#[async_trait]
impl IssueSource for GithubClient {
    async fn fetch_issue(&self, issue: &IssueRef) -> Result<FetchedIssue, Error> {
        let url = format!("{}/repos/{}/issues/{}", self.base, issue.repo, issue.number);
        let resp = self.get(&url, issue).await?;
        Ok(decode::<GhIssue>(resp, &url).await?.into())
    }

    async fn fetch_comments(&self, issue: &IssueRef) -> Result<Vec<FetchedComment>, Error> {
        let mut res = Vec::new();
        let mut url = Some(format!(
            "{}/repos/{}/issues/{}/comments?per_page={PER_PAGE}",
            self.base, issue.repo, issue.number
        ));
        while let Some(u) = url {
            let resp = self.get(&u, issue).await?;
            url = resp
                .headers()
                .get(header::LINK)
                .and_then(|l| l.to_str().ok())
                .and_then(next_page);
            let page = decode::<Vec<GhComment>>(resp, &u).await?;
            tracing::debug!(%issue, comments = page.len(), "fetched comment page");
            res.extend(page.into_iter().map(FetchedComment::from));
        }
        Ok(res)
    }
}

#[async_trait]
impl UserDirectory for GithubClient {
    async fn fetch_company(&self, login: &str) -> String {
        match self.profile(login).await {
            Ok(p) => p.company.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(login, ?err, "failed fetching user company");
                String::new()
            }
        }
    }
}
