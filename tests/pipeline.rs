use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use anyhow::Result;
use rs_mail_cleanup::cleanup::decision::Scripted;
use rs_mail_cleanup::cleanup::links::LinkExtractor;
use rs_mail_cleanup::cleanup::opener::LinkOpener;
use rs_mail_cleanup::cleanup::pipeline::{CleanupPipeline, Outcome, Phase};
use rs_mail_cleanup::domain::email::{MessageRef, RawMessage};
use rs_mail_cleanup::domain::sender::{Decision, SenderStats};
use rs_mail_cleanup::error::ProviderError;
use rs_mail_cleanup::mail::decoders::decode_raw_message;
use rs_mail_cleanup::mail::provider::{DryRun, MailProvider};

/// In-memory mailbox: message N lives at index N.
#[derive(Default)]
struct FakeMailbox {
    messages: Vec<Option<RawMessage>>,
    failing_deletes: HashSet<String>,
    deleted: Vec<String>,
    last_limit: Option<usize>,
}

impl FakeMailbox {
    fn with(messages: &[(&str, &str)]) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|(s, b)| Some(RawMessage::new(*s, *b)))
                .collect(),
            ..Default::default()
        }
    }
}

impl MailProvider for FakeMailbox {
    fn search(&mut self, _query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError> {
        self.last_limit = Some(limit);
        Ok((0..self.messages.len().min(limit))
            .map(|i| MessageRef::new(i.to_string()))
            .collect())
    }

    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError> {
        let idx: usize = msg.as_str().parse().unwrap();
        self.messages[idx]
            .clone()
            .ok_or_else(|| ProviderError::MessageUnavailable(msg.to_string()))
    }

    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError> {
        if self.failing_deletes.contains(sender) {
            return Err(ProviderError::Transient("503 backend error".into()));
        }
        self.deleted.push(sender.to_string());
        Ok(self
            .messages
            .iter()
            .flatten()
            .filter(|m| m.sender == sender)
            .count())
    }
}

#[derive(Clone, Default)]
struct RecordingOpener(Rc<RefCell<Vec<String>>>);

impl LinkOpener for RecordingOpener {
    fn open(&mut self, link: &str) -> Result<()> {
        self.0.borrow_mut().push(link.to_string());
        Ok(())
    }
}

fn pipeline<P: MailProvider>(p: P, opener: RecordingOpener) -> CleanupPipeline<P> {
    CleanupPipeline::new(p, LinkExtractor::default(), Box::new(opener))
}

const UNSUB: &str = r#"<p>Sale!</p><a href="http://x/u">Unsubscribe</a>"#;

#[test]
fn raw_sender_strings_group_separately() {
    let mut mailbox = FakeMailbox::with(&[
        (r#""A" <a@x.com>"#, ""),
        (r#""A" <a@x.com>"#, ""),
        ("a@x.com", ""),
    ]);
    let mut p = pipeline(&mut mailbox, RecordingOpener::default());
    let report = p.analyze("unsubscribe", 50).unwrap();

    let counts: Vec<(&str, usize)> = report.iter().map(|s| (s.sender.as_str(), s.count)).collect();
    assert_eq!(counts, vec![(r#""A" <a@x.com>"#, 2), ("a@x.com", 1)]);
    assert_eq!(p.phase(), Phase::Reported);
}

#[test]
fn unavailable_message_is_skipped_not_fatal() {
    let mut mailbox = FakeMailbox::with(&[("a@x.com", UNSUB), ("a@x.com", ""), ("b@y.com", "")]);
    mailbox.messages[1] = None;

    let mut p = pipeline(&mut mailbox, RecordingOpener::default());
    let report = p.analyze("q", 50).unwrap();

    assert_eq!(p.fetched(), 2);
    assert_eq!(p.skipped(), 1);
    assert_eq!(report.len(), 2);
    assert_eq!(report[0].sender, "a@x.com");
    assert_eq!(report[0].count, 1);
    assert!(report[0].links.contains("http://x/u"));
}

#[test]
fn nothing_found_finishes_without_asking() {
    let mut mailbox = FakeMailbox::default();
    let mut asked = 0;
    let mut decide = |_: &SenderStats| {
        asked += 1;
        Decision::Delete
    };

    let mut p = pipeline(&mut mailbox, RecordingOpener::default());
    let summary = p.run("q", 50, &mut decide).unwrap();

    assert!(summary.outcomes.is_empty());
    assert_eq!(p.phase(), Phase::Done);
    assert!(p.execute(&[], &mut decide).is_err());
    drop(p);
    assert_eq!(asked, 0);
    assert!(mailbox.deleted.is_empty());
}

#[test]
fn search_limit_is_forwarded() {
    let mut mailbox = FakeMailbox::with(&[("a", ""), ("b", ""), ("c", "")]);
    let report = pipeline(&mut mailbox, RecordingOpener::default())
        .analyze("q", 2)
        .unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(mailbox.last_limit, Some(2));
}

#[test]
fn failed_delete_does_not_stop_next_sender() {
    let mut mailbox = FakeMailbox::with(&[("a@x.com", ""), ("a@x.com", ""), ("b@y.com", "")]);
    mailbox.failing_deletes.insert("a@x.com".into());

    let mut all = |_: &SenderStats| Decision::Delete;
    let summary = pipeline(&mut mailbox, RecordingOpener::default())
        .run("q", 50, &mut all)
        .unwrap();

    assert_eq!(summary.outcomes.len(), 2);
    assert!(matches!(summary.outcomes[0].outcome, Outcome::Failed { .. }));
    assert_eq!(summary.outcomes[1].outcome, Outcome::Deleted { count: 1 });
    assert_eq!(summary.failures().count(), 1);
    assert_eq!(summary.deleted_total(), 1);
    assert_eq!(mailbox.deleted, vec!["b@y.com".to_string()]);
}

#[test]
fn scripted_unsubscribe_opens_links_and_degrades_without_them() {
    let mut mailbox = FakeMailbox::with(&[
        ("news@shop", UNSUB),
        ("news@shop", ""),
        ("promo@mall", "<p>no links here</p>"),
        ("friend@home", ""),
    ]);
    let opener = RecordingOpener::default();
    let mut decisions = Scripted::new(Decision::DeleteAndUnsubscribe).with("friend@home", Decision::Skip);

    let summary = pipeline(&mut mailbox, opener.clone())
        .run("q", 50, &mut decisions)
        .unwrap();

    let outcomes: Vec<(&str, &Outcome)> = summary
        .outcomes
        .iter()
        .map(|o| (o.sender.as_str(), &o.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("news@shop", &Outcome::Unsubscribed { count: 2, links_opened: 1 }),
            ("promo@mall", &Outcome::Deleted { count: 1 }),
            ("friend@home", &Outcome::Skipped),
        ]
    );
    assert_eq!(*opener.0.borrow(), vec!["http://x/u".to_string()]);
    assert_eq!(mailbox.deleted, vec!["news@shop".to_string(), "promo@mall".to_string()]);
}

#[test]
fn dry_run_reports_but_never_deletes() {
    let mut mailbox = FakeMailbox::with(&[("a@x.com", UNSUB), ("b@y.com", "")]);
    let mut all = |_: &SenderStats| Decision::Delete;

    let summary = pipeline(DryRun::new(&mut mailbox), RecordingOpener::default())
        .run("q", 50, &mut all)
        .unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.deleted_total(), 0);
    assert!(mailbox.deleted.is_empty());
}

#[test]
fn ties_keep_first_seen_order_end_to_end() {
    let senders = ["s3a", "s5", "s3b", "s1", "s5", "s3a", "s5", "s3b", "s5", "s3a", "s3b", "s5"];
    let msgs: Vec<(&str, &str)> = senders.iter().map(|s| (*s, "")).collect();
    let mut mailbox = FakeMailbox::with(&msgs);

    let report = pipeline(&mut mailbox, RecordingOpener::default())
        .analyze("q", 50)
        .unwrap();
    let got: Vec<(&str, usize)> = report.iter().map(|s| (s.sender.as_str(), s.count)).collect();
    assert_eq!(got, vec![("s5", 5), ("s3a", 3), ("s3b", 3), ("s1", 1)]);
}

/// Serves raw RFC 822 text, decoded the way the IMAP client decodes it.
struct RawMailbox {
    raw: Vec<&'static str>,
}

impl MailProvider for RawMailbox {
    fn search(&mut self, _query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError> {
        Ok((0..self.raw.len().min(limit))
            .map(|i| MessageRef::new(i.to_string()))
            .collect())
    }

    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError> {
        let idx: usize = msg.as_str().parse().unwrap();
        decode_raw_message(self.raw[idx].as_bytes())
    }

    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError> {
        panic!("unexpected delete for {sender:?}");
    }
}

#[test]
fn message_without_sender_is_skipped() {
    let mailbox = RawMailbox {
        raw: vec![
            "From: news@shop.example\r\nContent-Type: text/html\r\n\r\n<a href=\"http://x/u\">Unsubscribe</a>\r\n",
            "Subject: hi\r\nContent-Type: text/html\r\n\r\n<a href=\"http://y/u\">Unsubscribe</a>\r\n",
        ],
    };

    let mut p = pipeline(mailbox, RecordingOpener::default());
    let report = p.analyze("q", 50).unwrap();

    assert_eq!(p.fetched(), 1);
    assert_eq!(p.skipped(), 1);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].sender, "news@shop.example");
    assert!(report.iter().all(|s| !s.sender.is_empty()));
    assert!(!report[0].links.contains("http://y/u"));
}
