use crate::error::{ContentError, Result};
use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([^?]+)\?([bBqQ])\?([^?]*)\?=").unwrap();
    static ref ADJACENT_WORDS: Regex = Regex::new(r"\?=\s+=\?").unwrap();
    static ref ANGLE_ADDRESS: Regex = Regex::new(r"<([^<>\s]+@[^<>\s]+)>").unwrap();
}

/// Turns raw message bytes into a structured message.
pub trait MimeParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMessage {
    /// Lowercased header names; repeated headers are joined with a space.
    pub headers: HashMap<String, String>,
    pub sender: Option<String>,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub body: String,
}

impl ParsedMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Splits an RFC 5322 message into headers and body. Folded header lines are
/// unfolded; the body is kept as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderParser;

impl MimeParser for HeaderParser {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage> {
        let text = String::from_utf8_lossy(raw);
        let mut message = ParsedMessage::default();
        let mut last_header_key: Option<String> = None;
        let mut body_start = None;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                body_start = Some(offset);
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(value) = last_header_key
                    .as_ref()
                    .and_then(|key| message.headers.get_mut(key))
                {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                if message.headers.is_empty() {
                    return Err(ContentError::Mime(format!(
                        "line {} is not a header: {:?}",
                        text[..line_start].lines().count() + 1,
                        truncate(line, 40)
                    ))
                    .into());
                }
                // Tolerate a missing blank line between headers and body.
                body_start = Some(line_start);
                break;
            };

            let key = key.trim().to_lowercase();
            let value = value.trim().to_string();
            last_header_key = Some(key.clone());
            match message.headers.get_mut(&key) {
                Some(existing) => {
                    existing.push(' ');
                    existing.push_str(&value);
                }
                None => {
                    message.headers.insert(key, value);
                }
            }
        }

        if message.headers.is_empty() {
            return Err(ContentError::Mime("message has no headers".to_string()).into());
        }

        message.body = body_start.map(|start| text[start..].to_string()).unwrap_or_default();
        message.subject = message.header("subject").map(decode_mime_header);
        message.message_id = message.header("message-id").map(str::to_string);
        message.from = message.header("from").map(decode_mime_header);
        message.to = message
            .header("to")
            .map(|to| to.split(',').map(|addr| extract_address(addr.trim())).collect())
            .unwrap_or_default();
        message.sender = message
            .header("return-path")
            .map(|rp| rp.trim_matches(['<', '>']).to_string())
            .filter(|rp| !rp.is_empty())
            .or_else(|| message.header("from").map(extract_address));

        Ok(message)
    }
}

/// Extracts `user@host` from `"Name" <user@host>`, or returns the input.
pub fn extract_address(value: &str) -> String {
    ANGLE_ADDRESS
        .captures(value)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Decodes RFC 2047 encoded-words (`=?utf-8?B?...?=`). Charsets other than
/// UTF-8/ASCII are decoded lossily.
pub fn decode_mime_header(value: &str) -> String {
    // Whitespace between adjacent encoded-words is not significant.
    let joined = ADJACENT_WORDS.replace_all(value, "?==?");

    ENCODED_WORD
        .replace_all(&joined, |caps: &Captures| {
            let bytes = match &caps[2] {
                "B" | "b" => general_purpose::STANDARD.decode(&caps[3]).ok(),
                _ => Some(decode_q(&caps[3])),
            };
            match bytes {
                Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn decode_q(encoded: &str) -> Vec<u8> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let hi = char::from(bytes[i + 1]).to_digit(16);
                let lo = char::from(bytes[i + 2]).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 2;
                } else {
                    out.push(b'=');
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const RAW: &str = "Return-Path: <bounce@mailer.example.com>\r\n\
From: \"Alice Example\" <alice@example.com>\r\n\
To: bob@example.org, \"Carol\" <carol@example.org>\r\n\
Subject: =?utf-8?B?SGVsbG8gV29ybGQ=?=\r\n\
Message-ID: <61967230@example.com>\r\n\
Received: from a.example.com\r\n\
\tby b.example.com\r\n\
Received: from c.example.com\r\n\
\r\n\
Hi Bob,\r\nsee you.\r\n";

    #[test]
    fn test_parse_headers_and_body() {
        let message = HeaderParser.parse(RAW.as_bytes()).unwrap();
        assert_eq!(message.subject.as_deref(), Some("Hello World"));
        assert_eq!(message.from.as_deref(), Some("\"Alice Example\" <alice@example.com>"));
        assert_eq!(message.to, vec!["bob@example.org", "carol@example.org"]);
        assert_eq!(message.sender.as_deref(), Some("bounce@mailer.example.com"));
        assert_eq!(message.message_id.as_deref(), Some("<61967230@example.com>"));
        assert_eq!(
            message.header("Received"),
            Some("from a.example.com by b.example.com from c.example.com")
        );
        assert_eq!(message.body, "Hi Bob,\r\nsee you.\r\n");
    }

    #[test]
    fn test_sender_falls_back_to_from() {
        let raw = "From: Alice <alice@example.com>\nSubject: plain\n\nbody\n";
        let message = HeaderParser.parse(raw.as_bytes()).unwrap();
        assert_eq!(message.sender.as_deref(), Some("alice@example.com"));
        assert_eq!(message.subject.as_deref(), Some("plain"));
        assert_eq!(message.body, "body\n");
    }

    #[test]
    fn test_headers_only() {
        let message = HeaderParser.parse(b"Subject: X").unwrap();
        assert_eq!(message.subject.as_deref(), Some("X"));
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_not_a_message() {
        for raw in ["X", "", "\r\nbody only"] {
            let err = HeaderParser.parse(raw.as_bytes()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Content, "{raw:?}");
        }
    }

    #[test]
    fn test_decode_mime_header() {
        assert_eq!(decode_mime_header("=?UTF-8?Q?caf=C3=A9_au_lait?="), "café au lait");
        assert_eq!(
            decode_mime_header("=?utf-8?B?SGVsbG8g?= =?utf-8?B?V29ybGQ=?="),
            "Hello World"
        );
        assert_eq!(decode_mime_header("Re: =?iso-8859-1?Q?Hi?= there"), "Re: Hi there");
        assert_eq!(decode_mime_header("no encoding"), "no encoding");
        assert_eq!(decode_mime_header("=?utf-8?B?!!!?="), "=?utf-8?B?!!!?=");
    }

    #[test]
    fn test_extract_address() {
        assert_eq!(extract_address("Bob <bob@example.org>"), "bob@example.org");
        assert_eq!(extract_address("bob@example.org"), "bob@example.org");
    }
}
