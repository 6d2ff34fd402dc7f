use crate::mime::ParsedMessage;
use crate::notification::Verdict;

/// A received message handed to the caller, annotated with the provider's
/// verdicts. `spam_verdict` is the aggregated spam decision (`PASS` or
/// `FAIL`); the others are copied through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMail {
    pub message: ParsedMessage,
    pub raw_mime: Vec<u8>,
    pub spam_verdict: Option<Verdict>,
    pub spf_verdict: Option<Verdict>,
    pub dkim_verdict: Option<Verdict>,
    pub dmarc_verdict: Option<Verdict>,
}

impl InboundMail {
    pub fn new(message: ParsedMessage, raw_mime: Vec<u8>) -> Self {
        Self {
            message,
            raw_mime,
            spam_verdict: None,
            spf_verdict: None,
            dkim_verdict: None,
            dmarc_verdict: None,
        }
    }

    pub fn is_spam(&self) -> bool {
        self.spam_verdict
            .as_ref()
            .is_some_and(|v| v.is(crate::verdict::FAIL))
    }
}
