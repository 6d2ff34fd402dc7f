pub mod config;
pub mod confirmation;
pub mod content;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod http;
pub mod mail;
pub mod mime;
pub mod notification;
pub mod trust;
pub mod verdict;

pub use config::Config;
pub use confirmation::{ConfirmSubscriptionResponse, ConfirmationClient, UnsubscribeResponse};
pub use content::{ContentResolver, LocalObjectStore, ObjectStore};
pub use envelope::{Envelope, EnvelopeType};
pub use error::{Error, ErrorKind, Result};
pub use handler::SesHandler;
pub use http::{HttpFetcher, ReqwestFetcher};
pub use mail::InboundMail;
pub use mime::{HeaderParser, MimeParser, ParsedMessage};
pub use notification::{Notification, NotificationKind, Receipt, Verdict};
pub use trust::TrustVerifier;
