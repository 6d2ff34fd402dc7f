//! The outer SNS envelope and the canonical string its signature covers.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Outer envelope `Type` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeType {
    SubscriptionConfirmation,
    Notification,
    UnsubscribeConfirmation,
    Other(String),
    #[default]
    Missing,
}

impl EnvelopeType {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeType::SubscriptionConfirmation => "SubscriptionConfirmation",
            EnvelopeType::Notification => "Notification",
            EnvelopeType::UnsubscribeConfirmation => "UnsubscribeConfirmation",
            EnvelopeType::Other(other) => other,
            EnvelopeType::Missing => "",
        }
    }
}

impl From<String> for EnvelopeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SubscriptionConfirmation" => EnvelopeType::SubscriptionConfirmation,
            "Notification" => EnvelopeType::Notification,
            "UnsubscribeConfirmation" => EnvelopeType::UnsubscribeConfirmation,
            "" => EnvelopeType::Missing,
            _ => EnvelopeType::Other(value),
        }
    }
}

impl From<EnvelopeType> for String {
    fn from(value: EnvelopeType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EnvelopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single POST from SNS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    #[serde(rename = "Type", deserialize_with = "nullable")]
    pub kind: EnvelopeType,
    #[serde(rename = "Message", deserialize_with = "nullable")]
    pub message: String,
    #[serde(rename = "MessageId", deserialize_with = "nullable")]
    pub message_id: String,
    #[serde(rename = "Signature", deserialize_with = "nullable")]
    pub signature: String,
    #[serde(rename = "SignatureVersion", deserialize_with = "nullable")]
    pub signature_version: String,
    #[serde(rename = "SigningCertURL", deserialize_with = "nullable")]
    pub signing_cert_url: String,
    #[serde(rename = "SubscribeURL", deserialize_with = "nullable")]
    pub subscribe_url: String,
    #[serde(rename = "UnsubscribeURL", deserialize_with = "nullable")]
    pub unsubscribe_url: String,
    #[serde(rename = "Subject", deserialize_with = "nullable")]
    pub subject: String,
    #[serde(rename = "Timestamp", deserialize_with = "nullable")]
    pub timestamp: String,
    #[serde(rename = "Token", deserialize_with = "nullable")]
    pub token: String,
    #[serde(rename = "TopicArn", deserialize_with = "nullable")]
    pub topic_arn: String,
}

/// SNS sends `"Subject": null` for subject-less notifications; any key may be
/// null and reads as empty.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

type FieldAccessor = fn(&Envelope) -> &str;

/// Fields covered by the signature, in signing order. Anything not listed here
/// (Signature, SignatureVersion, SigningCertURL, UnsubscribeURL) is ignored.
pub const SIGNABLE_FIELDS: [(&str, FieldAccessor); 8] = [
    ("Message", |e| e.message.as_str()),
    ("MessageId", |e| e.message_id.as_str()),
    ("Subject", |e| e.subject.as_str()),
    ("SubscribeURL", |e| e.subscribe_url.as_str()),
    ("Timestamp", |e| e.timestamp.as_str()),
    ("Token", |e| e.token.as_str()),
    ("TopicArn", |e| e.topic_arn.as_str()),
    ("Type", |e| e.kind.as_str()),
];

impl Envelope {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Builds the exact byte string SNS signed: `"<Key>\n<Value>\n"` for every
    /// non-empty signable field.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, field) in SIGNABLE_FIELDS.iter() {
            let value = field(self);
            if value.is_empty() {
                continue;
            }
            out.extend_from_slice(key.as_bytes());
            out.push(b'\n');
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        out
    }
}
