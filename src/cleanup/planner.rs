use crate::domain::sender::{Action, Decision, SenderStats};

/// Turns a decision about one sender into the action to run.
///
/// Asking to unsubscribe from a sender with no known links falls back to a
/// plain delete.
pub fn plan(stats: &SenderStats, decision: Decision) -> Action {
    match decision {
        Decision::Skip => Action::None,
        Decision::Delete => Action::Delete {
            sender: stats.sender.clone(),
        },
        Decision::DeleteAndUnsubscribe if stats.links.is_empty() => Action::Delete {
            sender: stats.sender.clone(),
        },
        Decision::DeleteAndUnsubscribe => Action::DeleteAndNotify {
            sender: stats.sender.clone(),
            links: stats.links.clone(),
        },
    }
}
