use mailparse::{MailAddr, MailHeaderMap, ParsedMail};

use crate::domain::email::RawMessage;
use crate::error::ProviderError;

/// Reduces an RFC 822 message to its sender and the body best suited for
/// link extraction (HTML first, then plain text).
///
/// A message that does not parse or has no `From` header is unavailable:
/// without a sender there is nothing to group it under.
pub fn decode_raw_message(raw_rfc822: &[u8]) -> Result<RawMessage, ProviderError> {
    let parsed = mailparse::parse_mail(raw_rfc822)
        .map_err(|e| ProviderError::MessageUnavailable(format!("unparseable message: {e}")))?;

    let sender = parsed
        .headers
        .get_first_value("From")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::MessageUnavailable("message has no From header".into()))?;

    let body = find_part(&parsed, "text/html")
        .or_else(|| find_part(&parsed, "text/plain"))
        .or_else(|| parsed.get_body().ok())
        .unwrap_or_default();

    Ok(RawMessage { sender, body })
}

fn find_part(p: &ParsedMail, mime: &str) -> Option<String> {
    if p.subparts.is_empty() {
        if p.ctype.mimetype.eq_ignore_ascii_case(mime) {
            return p.get_body().ok();
        }
        return None;
    }
    p.subparts.iter().find_map(|sp| find_part(sp, mime))
}

/// Bare mailbox address of a From header value, e.g. `a@b.com` for
/// `"Shop" <a@b.com>`. `None` unless the result looks like `local@domain`.
pub fn sender_address(sender: &str) -> Option<String> {
    let addrs = mailparse::addrparse(sender).ok()?;
    addrs
        .iter()
        .find_map(|a| match a {
            MailAddr::Single(info) => Some(info.addr.trim().to_string()),
            MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.trim().to_string()),
        })
        .filter(|addr| match addr.split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
            None => false,
        })
}

/// IMAP search criteria selecting every message from `sender`'s address.
///
/// IMAP `FROM` is a substring match, so a sender without a usable address is
/// refused rather than searched for verbatim.
pub fn delete_criteria(sender: &str) -> Result<String, ProviderError> {
    let addr = sender_address(sender)
        .ok_or_else(|| ProviderError::InvalidSender(sender.to_string()))?;
    Ok(format!("FROM {}", imap_quote(&addr)))
}

/// Quotes a string for use as an IMAP `quoted` argument.
pub fn imap_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
