//! SES notification carried in the `Message` field of a `Notification` envelope.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    Received,
    Bounce,
    Complaint,
    Delivery,
    Reject,
    Send,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::Received => "Received",
            NotificationKind::Bounce => "Bounce",
            NotificationKind::Complaint => "Complaint",
            NotificationKind::Delivery => "Delivery",
            NotificationKind::Reject => "Reject",
            NotificationKind::Send => "Send",
            NotificationKind::Other(other) => other,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Received" => NotificationKind::Received,
            "Bounce" => NotificationKind::Bounce,
            "Complaint" => NotificationKind::Complaint,
            "Delivery" => NotificationKind::Delivery,
            "Reject" => NotificationKind::Reject,
            "Send" => NotificationKind::Send,
            _ => NotificationKind::Other(value),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(value: NotificationKind) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_type: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    /// Raw MIME when the receipt rule publishes content inline.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl Notification {
    pub fn from_message(message: &str) -> Result<Self> {
        Ok(serde_json::from_str(message)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MailSummary {
    pub timestamp: String,
    pub source: String,
    pub message_id: String,
    pub destination: Vec<String>,
    pub headers_truncated: bool,
    pub headers: Vec<HeaderAttribute>,
    pub common_headers: Option<CommonHeaders>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderAttribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonHeaders {
    pub return_path: String,
    pub from: Vec<String>,
    pub date: String,
    pub to: Vec<String>,
    pub message_id: String,
    pub subject: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Receipt {
    pub timestamp: String,
    pub processing_time_millis: u64,
    pub recipients: Vec<String>,
    pub spam_verdict: Option<Verdict>,
    pub virus_verdict: Option<Verdict>,
    pub spf_verdict: Option<Verdict>,
    pub dkim_verdict: Option<Verdict>,
    pub dmarc_verdict: Option<Verdict>,
    pub action: Option<ReceiptAction>,
}

/// A single provider check result, e.g. `{"status": "PASS"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verdict {
    pub status: String,
}

impl Verdict {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    pub fn is(&self, status: &str) -> bool {
        self.status == status
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReceiptAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub topic_arn: String,
    pub bucket_name: String,
    pub object_key_prefix: String,
    pub object_key: String,
}
