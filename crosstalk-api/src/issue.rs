use std::{fmt, str::FromStr};

use crate::{Error, Time};

/// An issue on the remote tracker, as `owner/name#number`
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct IssueRef {
    /// `owner/name`
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    pub fn new(repo: &str, number: u64) -> Result<IssueRef, Error> {
        IssueRef::from_str(&format!("{repo}#{number}"))
    }

    pub fn owner(&self) -> &str {
        self.repo.split_once('/').map(|(o, _)| o).unwrap_or(&self.repo)
    }

    pub fn name(&self) -> &str {
        self.repo.split_once('/').map(|(_, n)| n).unwrap_or("")
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

impl FromStr for IssueRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<IssueRef, Error> {
        let invalid = || Error::InvalidIssueRef(String::from(s));
        let (repo, number) = s.trim().rsplit_once('#').ok_or_else(invalid)?;
        let (owner, name) = repo.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        let number = number.parse::<u64>().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }
        Ok(IssueRef {
            repo: String::from(repo),
            number,
        })
    }
}

impl TryFrom<String> for IssueRef {
    type Error = Error;

    fn try_from(s: String) -> Result<IssueRef, Error> {
        IssueRef::from_str(&s)
    }
}

impl From<IssueRef> for String {
    fn from(i: IssueRef) -> String {
        i.to_string()
    }
}

/// The issue itself, whose body becomes the original post of its thread
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FetchedIssue {
    pub author: String,
    pub date: Time,
    pub body: Option<String>,
    pub title: String,
}
