//! Entry point for SNS deliveries from an SES receipt rule.

use crate::config::Config;
use crate::confirmation::{ConfirmationClient, UnsubscribeResponse};
use crate::content::{ContentResolver, LocalObjectStore, ObjectStore};
use crate::envelope::{Envelope, EnvelopeType};
use crate::error::{Error, Result};
use crate::http::{HttpFetcher, ReqwestFetcher};
use crate::mail::InboundMail;
use crate::mime::{HeaderParser, MimeParser};
use crate::notification::{Notification, NotificationKind, Receipt, Verdict};
use crate::trust::TrustVerifier;
use crate::verdict;
use log::{debug, info, warn};
use std::sync::Arc;

pub struct SesHandler {
    verifier: TrustVerifier,
    confirmations: ConfirmationClient,
    content: ContentResolver,
    parser: Arc<dyn MimeParser>,
}

impl SesHandler {
    pub fn new(
        verifier: TrustVerifier,
        confirmations: ConfirmationClient,
        content: ContentResolver,
        parser: Arc<dyn MimeParser>,
    ) -> Self {
        Self {
            verifier,
            confirmations,
            content,
            parser,
        }
    }

    /// Wires the default collaborators: reqwest for HTTPS, the local object
    /// store under `content.object_store_root`, and [`HeaderParser`].
    pub fn from_config(config: &Config) -> Self {
        let fetcher: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(&config.http.user_agent));
        let store: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(&config.content.object_store_root));

        Self::new(
            TrustVerifier::new(fetcher.clone(), config.http.certificate_timeout()),
            ConfirmationClient::new(fetcher, config.http.confirmation_timeout()),
            ContentResolver::new(store, config.content.timeout()),
            Arc::new(HeaderParser),
        )
    }

    /// Authenticates and routes one SNS POST body.
    ///
    /// Returns `Ok(Some(_))` only for `Received` notifications. Subscription
    /// confirmations and the other SES event kinds are acknowledged with
    /// `Ok(None)`.
    pub async fn receive_mail(&self, body: &[u8]) -> Result<Option<InboundMail>> {
        let envelope = Envelope::from_slice(body)?;

        if let Err(e) = self.verifier.verify(&envelope).await {
            warn!(
                "Rejected {} envelope {}: {}",
                envelope.kind, envelope.message_id, e
            );
            return Err(e);
        }

        match &envelope.kind {
            EnvelopeType::SubscriptionConfirmation => {
                self.confirmations.subscribe(&envelope.subscribe_url).await?;
                Ok(None)
            }
            EnvelopeType::Notification => {
                let notification = Notification::from_message(&envelope.message)?;
                self.dispatch(&envelope, notification).await
            }
            other => Err(Error::UnrecognizedType(other.as_str().to_string())),
        }
    }

    /// Leaves the topic the envelope was delivered on.
    pub async fn unsubscribe(&self, envelope: &Envelope) -> Result<UnsubscribeResponse> {
        self.confirmations.unsubscribe(&envelope.unsubscribe_url).await
    }

    async fn dispatch(
        &self,
        envelope: &Envelope,
        notification: Notification,
    ) -> Result<Option<InboundMail>> {
        match &notification.notification_type {
            NotificationKind::Received => {
                let mail = self
                    .materialize(notification.receipt.as_ref(), &notification.content)
                    .await?;
                info!(
                    "Received mail {} from {} ({} bytes, spam={})",
                    envelope.message_id,
                    mail.message.sender.as_deref().unwrap_or("unknown"),
                    mail.raw_mime.len(),
                    mail.is_spam()
                );
                Ok(Some(mail))
            }
            NotificationKind::Bounce
            | NotificationKind::Complaint
            | NotificationKind::Delivery
            | NotificationKind::Reject
            | NotificationKind::Send => {
                debug!(
                    "Ignoring {} notification {}",
                    notification.notification_type.as_str(),
                    envelope.message_id
                );
                Ok(None)
            }
            NotificationKind::Other(kind) => Err(Error::UnrecognizedNotificationKind(kind.clone())),
        }
    }

    async fn materialize(&self, receipt: Option<&Receipt>, inline: &str) -> Result<InboundMail> {
        let raw_mime = self.content.resolve(receipt, inline).await?;
        let message = self.parser.parse(&raw_mime)?;
        let mut mail = InboundMail::new(message, raw_mime);

        if let Some(receipt) = receipt {
            if receipt.spam_verdict.is_some() {
                mail.spam_verdict = Some(Verdict::new(verdict::spam_status(receipt)));
            }
            mail.spf_verdict = receipt.spf_verdict.clone();
            mail.dkim_verdict = receipt.dkim_verdict.clone();
            mail.dmarc_verdict = receipt.dmarc_verdict.clone();
        }
        Ok(mail)
    }
}
