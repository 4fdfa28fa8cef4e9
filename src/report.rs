use anyhow::Result;
use std::io::Write;

use crate::cleanup::pipeline::{Outcome, RunSummary};
use crate::domain::sender::SenderStats;

/// Ranked sender list, one block per sender.
pub fn write_report<W: Write>(out: &mut W, report: &[SenderStats]) -> Result<()> {
    writeln!(out, "\nSender Summary:")?;
    writeln!(out, "{}", "-".repeat(50))?;
    for (rank, stats) in report.iter().enumerate() {
        writeln!(out, "\n{:>3}. {}", rank + 1, stats.sender)?;
        writeln!(out, "     Email count: {}", stats.count)?;
        for link in &stats.links {
            writeln!(out, "     - {link}")?;
        }
    }
    Ok(())
}

pub fn write_report_json<W: Write>(out: &mut W, report: &[SenderStats]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(
        out,
        "\nProcessed {} emails ({} skipped), deleted {}.",
        summary.fetched,
        summary.skipped,
        summary.deleted_total()
    )?;
    for failed in summary.failures() {
        if let Outcome::Failed { error } = &failed.outcome {
            writeln!(out, "  failed for {}: {}", failed.sender, error)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::pipeline::SenderOutcome;
    use crate::domain::sender::Decision;

    fn stats(sender: &str, count: usize, links: &[&str]) -> SenderStats {
        let mut s = SenderStats::new(sender);
        s.count = count;
        s.links = links.iter().map(|l| l.to_string()).collect();
        s
    }

    #[test]
    fn text_report_lists_senders_in_order() {
        let mut out = Vec::new();
        write_report(
            &mut out,
            &[stats("big@x", 5, &["http://x/u"]), stats("small@y", 1, &[])],
        )
        .unwrap();
        let s = String::from_utf8(out).unwrap();
        let big = s.find("big@x").unwrap();
        let small = s.find("small@y").unwrap();
        assert!(big < small);
        assert!(s.contains("Email count: 5"));
        assert!(s.contains("- http://x/u"));
    }

    #[test]
    fn json_report_is_an_array() {
        let mut out = Vec::new();
        write_report_json(&mut out, &[stats("a@x", 2, &["http://a"])]).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v[0]["sender"], "a@x");
        assert_eq!(v[0]["count"], 2);
        assert_eq!(v[0]["links"][0], "http://a");
    }

    #[test]
    fn summary_mentions_failures() {
        let summary = RunSummary {
            fetched: 4,
            skipped: 1,
            outcomes: vec![
                SenderOutcome {
                    sender: "a@x".into(),
                    decision: Decision::Delete,
                    outcome: Outcome::Deleted { count: 3 },
                },
                SenderOutcome {
                    sender: "b@x".into(),
                    decision: Decision::Delete,
                    outcome: Outcome::Failed {
                        error: "timeout".into(),
                    },
                },
            ],
        };
        let mut out = Vec::new();
        write_summary(&mut out, &summary).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("Processed 4 emails (1 skipped), deleted 3."));
        assert!(s.contains("failed for b@x: timeout"));
    }
}
