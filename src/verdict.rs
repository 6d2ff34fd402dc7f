use crate::notification::{Receipt, Verdict};

pub const PASS: &str = "PASS";
pub const FAIL: &str = "FAIL";
pub const GRAY: &str = "GRAY";

fn passed(verdict: &Option<Verdict>, status: &str) -> bool {
    verdict.as_ref().is_some_and(|v| v.is(status))
}

/// Collapses the spam, virus and SPF verdicts into a single spam flag.
///
/// Clean spam and virus checks with a passing (or gray) SPF result are not
/// spam. Otherwise, as long as the virus scan is clean the message is routed
/// as spam; anything else falls through to "not spam". DKIM and DMARC are
/// reported separately and play no part here.
pub fn is_spam(receipt: &Receipt) -> bool {
    let virus_clean = passed(&receipt.virus_verdict, PASS);
    let spf_ok = passed(&receipt.spf_verdict, PASS) || passed(&receipt.spf_verdict, GRAY);

    if passed(&receipt.spam_verdict, PASS) && virus_clean && spf_ok {
        false
    } else {
        virus_clean
    }
}

/// Status string attached to the mail artifact for the aggregated spam check.
pub fn spam_status(receipt: &Receipt) -> &'static str {
    if is_spam(receipt) {
        FAIL
    } else {
        PASS
    }
}
