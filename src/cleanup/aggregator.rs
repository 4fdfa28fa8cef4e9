use std::collections::HashMap;

use crate::cleanup::links::LinkExtractor;
use crate::domain::email::RawMessage;
use crate::domain::sender::SenderStats;

/// Groups messages by their raw sender string for one analysis pass.
///
/// Entries are kept in first-seen order so that `report` can break count
/// ties deterministically. Use a fresh aggregator per run.
pub struct SenderAggregator {
    extractor: LinkExtractor,
    stats: Vec<SenderStats>,
    index: HashMap<String, usize>,
}

impl SenderAggregator {
    pub fn new(extractor: LinkExtractor) -> Self {
        Self {
            extractor,
            stats: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn ingest(&mut self, message: &RawMessage) {
        let links = self.extractor.extract(&message.body);
        let entry = self.entry(&message.sender);
        entry.count += 1;
        entry.links.extend(links);
    }

    /// Senders by descending count; equal counts stay in first-seen order.
    pub fn report(&self) -> Vec<SenderStats> {
        let mut out = self.stats.clone();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn total_messages(&self) -> usize {
        self.stats.iter().map(|s| s.count).sum()
    }

    fn entry(&mut self, sender: &str) -> &mut SenderStats {
        let idx = match self.index.get(sender) {
            Some(&idx) => idx,
            None => {
                let idx = self.stats.len();
                self.stats.push(SenderStats::new(sender));
                self.index.insert(sender.to_string(), idx);
                idx
            }
        };
        &mut self.stats[idx]
    }
}

impl Default for SenderAggregator {
    fn default() -> Self {
        Self::new(LinkExtractor::default())
    }
}
