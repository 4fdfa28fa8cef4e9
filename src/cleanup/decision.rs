use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::domain::sender::{Decision, SenderStats};

/// Supplies the decision for each sender in the report.
pub trait DecisionSource {
    fn decide(&mut self, stats: &SenderStats) -> Result<Decision>;
}

impl<F> DecisionSource for F
where
    F: FnMut(&SenderStats) -> Decision,
{
    fn decide(&mut self, stats: &SenderStats) -> Result<Decision> {
        Ok(self(stats))
    }
}

/// Asks on a terminal, re-asking until the answer is 1, 2 or 3.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn show(&mut self, stats: &SenderStats) -> Result<()> {
        writeln!(self.output, "\nSender: {}", stats.sender)?;
        writeln!(self.output, "Email count: {}", stats.count)?;
        if !stats.links.is_empty() {
            writeln!(self.output, "Unsubscribe links found:")?;
            for link in &stats.links {
                writeln!(self.output, "- {link}")?;
            }
        }
        Ok(())
    }
}

impl Prompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> DecisionSource for Prompt<R, W> {
    fn decide(&mut self, stats: &SenderStats) -> Result<Decision> {
        self.show(stats)?;
        loop {
            write!(
                self.output,
                "\nWhat would you like to do with emails from this sender?\n\
                 1: Delete all\n\
                 2: Delete and open unsubscribe link\n\
                 3: Skip\n\
                 Choice (1-3): "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(anyhow!("input closed while waiting for a choice"));
            }
            match line.trim() {
                "1" => return Ok(Decision::Delete),
                "2" => return Ok(Decision::DeleteAndUnsubscribe),
                "3" => return Ok(Decision::Skip),
                _ => writeln!(self.output, "Invalid choice. Please enter 1, 2, or 3.")?,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DecisionsFile {
    #[serde(default = "default_decision")]
    default: Decision,
    #[serde(default)]
    decisions: HashMap<String, Decision>,
}

fn default_decision() -> Decision {
    Decision::Skip
}

/// Fixed per-sender decisions, keyed by the exact sender string.
#[derive(Debug, Clone)]
pub struct Scripted {
    table: HashMap<String, Decision>,
    default: Decision,
}

impl Scripted {
    pub fn new(default: Decision) -> Self {
        Self {
            table: HashMap::new(),
            default,
        }
    }

    pub fn with(mut self, sender: impl Into<String>, decision: Decision) -> Self {
        self.table.insert(sender.into(), decision);
        self
    }

    /// Parses a TOML table such as:
    ///
    /// ```toml
    /// default = "skip"
    ///
    /// [decisions]
    /// "News <news@shop.example>" = "delete_and_unsubscribe"
    /// ```
    pub fn from_toml(s: &str) -> Result<Self> {
        let file: DecisionsFile = toml::from_str(s)?;
        Ok(Self {
            table: file.decisions,
            default: file.default,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading decisions file {}", path.display()))?;
        Self::from_toml(&s).with_context(|| format!("parsing decisions file {}", path.display()))
    }
}

impl DecisionSource for Scripted {
    fn decide(&mut self, stats: &SenderStats) -> Result<Decision> {
        Ok(self
            .table
            .get(&stats.sender)
            .copied()
            .unwrap_or(self.default))
    }
}
