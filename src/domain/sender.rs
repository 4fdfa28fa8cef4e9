use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    pub sender: String,
    pub count: usize,
    pub links: BTreeSet<String>,
}

impl SenderStats {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            count: 0,
            links: BTreeSet::new(),
        }
    }
}

/// What the user (or a policy) wants done with one sender's mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Skip,
    Delete,
    DeleteAndUnsubscribe,
}

impl FromStr for Decision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Decision::Skip),
            "delete" => Ok(Decision::Delete),
            "delete_and_unsubscribe" | "unsubscribe" => Ok(Decision::DeleteAndUnsubscribe),
            other => Err(anyhow::anyhow!("unknown decision '{other}'")),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Skip => "skip",
            Decision::Delete => "delete",
            Decision::DeleteAndUnsubscribe => "delete_and_unsubscribe",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Delete {
        sender: String,
    },
    DeleteAndNotify {
        sender: String,
        links: BTreeSet<String>,
    },
}
