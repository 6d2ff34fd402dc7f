//! Subscription handshake with SNS.
//!
//! Visiting a `SubscribeURL` (or `UnsubscribeURL`) is all SNS needs to confirm
//! the change; the response is a small XML document echoed back for logging.
//! These URLs come from an envelope that already passed signature checks, so
//! no further verification happens here.

use crate::error::{DecodeError, Result, TrustError};
use crate::http::HttpFetcher;
use log::info;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmSubscriptionResponse {
    pub subscription_arn: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribeResponse {
    pub request_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ConfirmSubscriptionXml {
    confirm_subscription_result: ConfirmSubscriptionResultXml,
    response_metadata: ResponseMetadataXml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ConfirmSubscriptionResultXml {
    subscription_arn: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct UnsubscribeXml {
    response_metadata: ResponseMetadataXml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ResponseMetadataXml {
    request_id: String,
}

pub struct ConfirmationClient {
    fetcher: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl ConfirmationClient {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    pub async fn subscribe(&self, subscribe_url: &str) -> Result<ConfirmSubscriptionResponse> {
        let body = self.visit("SubscribeURL", subscribe_url).await?;
        let xml: ConfirmSubscriptionXml = decode_acknowledgment(&body, "ConfirmSubscriptionResponse")?;

        let response = ConfirmSubscriptionResponse {
            subscription_arn: xml.confirm_subscription_result.subscription_arn,
            request_id: xml.response_metadata.request_id,
        };
        info!(
            "Confirmed subscription {} (request {})",
            response.subscription_arn, response.request_id
        );
        Ok(response)
    }

    pub async fn unsubscribe(&self, unsubscribe_url: &str) -> Result<UnsubscribeResponse> {
        let body = self.visit("UnsubscribeURL", unsubscribe_url).await?;
        let xml: UnsubscribeXml = decode_acknowledgment(&body, "UnsubscribeResponse")?;

        let response = UnsubscribeResponse {
            request_id: xml.response_metadata.request_id,
        };
        info!("Unsubscribed (request {})", response.request_id);
        Ok(response)
    }

    async fn visit(&self, field: &'static str, raw: &str) -> Result<Vec<u8>> {
        if raw.is_empty() {
            return Err(TrustError::MissingUrl(field).into());
        }
        let url = Url::parse(raw).map_err(|e| TrustError::InvalidUrl(field, e))?;
        self.fetcher.get(&url, self.timeout).await
    }
}

/// Decodes an SNS query-API response whose document element must be `root`.
fn decode_acknowledgment<T: DeserializeOwned>(body: &[u8], root: &'static str) -> Result<T> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                let name = tag.local_name();
                if name.as_ref() != root.as_bytes() {
                    return Err(DecodeError::UnexpectedRoot {
                        expected: root,
                        found: String::from_utf8_lossy(name.as_ref()).into_owned(),
                    }
                    .into());
                }
                break;
            }
            Ok(Event::Eof) => {
                return Err(DecodeError::UnexpectedRoot {
                    expected: root,
                    found: String::new(),
                }
                .into());
            }
            Ok(_) => {}
            Err(e) => return Err(DecodeError::Xml(quick_xml::DeError::InvalidXml(e)).into()),
        }
        buf.clear();
    }

    Ok(quick_xml::de::from_reader(body).map_err(DecodeError::Xml)?)
}
