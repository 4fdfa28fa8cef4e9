use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::cleanup::aggregator::SenderAggregator;
use crate::cleanup::decision::DecisionSource;
use crate::cleanup::links::LinkExtractor;
use crate::cleanup::opener::LinkOpener;
use crate::cleanup::planner::plan;
use crate::domain::sender::{Action, Decision, SenderStats};
use crate::mail::provider::MailProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    Ingesting,
    Reported,
    Deciding,
    Executing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Skipped,
    Deleted { count: usize },
    Unsubscribed { count: usize, links_opened: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SenderOutcome {
    pub sender: String,
    pub decision: Decision,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Messages fetched and ingested.
    pub fetched: usize,
    /// Messages the provider could not deliver.
    pub skipped: usize,
    pub outcomes: Vec<SenderOutcome>,
}

impl RunSummary {
    pub fn deleted_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.outcome {
                Outcome::Deleted { count } | Outcome::Unsubscribed { count, .. } => count,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SenderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
    }
}

/// One cleanup pass: search, aggregate by sender, then act on each sender.
///
/// A pipeline runs once. After it reaches [`Phase::Done`] it refuses further
/// work; build a new one for the next pass.
pub struct CleanupPipeline<P> {
    provider: P,
    aggregator: SenderAggregator,
    opener: Box<dyn LinkOpener>,
    phase: Phase,
    fetched: usize,
    skipped: usize,
}

impl<P: MailProvider> CleanupPipeline<P> {
    pub fn new(provider: P, extractor: LinkExtractor, opener: Box<dyn LinkOpener>) -> Self {
        Self {
            provider,
            aggregator: SenderAggregator::new(extractor),
            opener,
            phase: Phase::Idle,
            fetched: 0,
            skipped: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    fn enter(&mut self, next: Phase) {
        debug!("pipeline {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Searches, fetches and aggregates. Returns the ranked sender report,
    /// empty when the search found nothing (the pass is then finished).
    pub fn analyze(&mut self, query: &str, limit: usize) -> Result<Vec<SenderStats>> {
        if self.phase != Phase::Idle {
            return Err(anyhow!("analyze called in phase {:?}", self.phase));
        }

        self.enter(Phase::Searching);
        let refs = match self.provider.search(query, limit) {
            Ok(refs) => refs,
            Err(e) => {
                self.enter(Phase::Done);
                return Err(e).with_context(|| format!("search '{query}' failed"));
            }
        };

        if refs.is_empty() {
            info!("no messages matched '{query}'");
            self.enter(Phase::Done);
            return Ok(Vec::new());
        }
        info!("found {} candidate messages", refs.len());

        self.enter(Phase::Ingesting);
        let total = refs.len();
        for (i, msg_ref) in refs.iter().enumerate() {
            debug!("processing message {}/{} ({})", i + 1, total, msg_ref);
            match self.provider.fetch(msg_ref) {
                Ok(msg) => {
                    self.aggregator.ingest(&msg);
                    self.fetched += 1;
                }
                Err(e) => {
                    warn!("skipping message {msg_ref}: {e}");
                    self.skipped += 1;
                }
            }
        }

        self.enter(Phase::Reported);
        let report = self.aggregator.report();
        info!(
            "analysis complete: {} messages from {} senders ({} skipped)",
            self.fetched,
            report.len(),
            self.skipped
        );
        Ok(report)
    }

    /// Asks `decisions` about each sender in `report` order and carries out
    /// the resulting actions. A failed delete is recorded and the next sender
    /// is still processed.
    pub fn execute<D>(&mut self, report: &[SenderStats], decisions: &mut D) -> Result<RunSummary>
    where
        D: DecisionSource + ?Sized,
    {
        if self.phase != Phase::Reported {
            return Err(anyhow!("execute called in phase {:?}", self.phase));
        }

        let mut outcomes = Vec::with_capacity(report.len());
        for stats in report {
            self.enter(Phase::Deciding);
            let decision = match decisions.decide(stats) {
                Ok(d) => d,
                Err(e) => {
                    self.enter(Phase::Done);
                    return Err(e).with_context(|| format!("no decision for {}", stats.sender));
                }
            };

            self.enter(Phase::Executing);
            let outcome = self.apply(plan(stats, decision));
            outcomes.push(SenderOutcome {
                sender: stats.sender.clone(),
                decision,
                outcome,
            });
        }

        self.enter(Phase::Done);
        Ok(RunSummary {
            fetched: self.fetched,
            skipped: self.skipped,
            outcomes,
        })
    }

    /// `analyze` followed by `execute` over the full report.
    pub fn run<D>(&mut self, query: &str, limit: usize, decisions: &mut D) -> Result<RunSummary>
    where
        D: DecisionSource + ?Sized,
    {
        let report = self.analyze(query, limit)?;
        if self.phase == Phase::Done {
            return Ok(RunSummary {
                fetched: self.fetched,
                skipped: self.skipped,
                outcomes: Vec::new(),
            });
        }
        self.execute(&report, decisions)
    }

    fn apply(&mut self, action: Action) -> Outcome {
        match action {
            Action::None => Outcome::Skipped,
            Action::Delete { sender } => match self.provider.delete(&sender) {
                Ok(count) => {
                    info!("deleted {count} messages from {sender}");
                    Outcome::Deleted { count }
                }
                Err(e) => {
                    error!("deleting messages from {sender} failed: {e}");
                    Outcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
            Action::DeleteAndNotify { sender, links } => {
                let count = match self.provider.delete(&sender) {
                    Ok(count) => count,
                    Err(e) => {
                        error!("deleting messages from {sender} failed: {e}");
                        return Outcome::Failed {
                            error: e.to_string(),
                        };
                    }
                };
                info!("deleted {count} messages from {sender}");

                let mut links_opened = 0;
                for link in &links {
                    match self.opener.open(link) {
                        Ok(()) => links_opened += 1,
                        Err(e) => warn!("unsubscribe link for {sender} not opened: {e:#}"),
                    }
                }
                Outcome::Unsubscribed {
                    count,
                    links_opened,
                }
            }
        }
    }
}
