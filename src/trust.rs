//! Proves an envelope was signed by SNS.
//!
//! The signing certificate is fetched fresh for every envelope from the
//! `SigningCertURL`, which must be an `https` URL on an SNS host. Only the leaf
//! certificate is inspected; no chain building is attempted.

use crate::envelope::Envelope;
use crate::error::{DecodeError, Result, TrustError};
use crate::http::HttpFetcher;
use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

lazy_static! {
    // https://github.com/robbiet480/go.sns/issues/2
    static ref SNS_HOST: Regex =
        Regex::new(r"^sns\.[a-zA-Z0-9\-]{3,}\.amazonaws\.com(\.cn)?$").unwrap();
}

/// Where the verifier gets the certificate to check signatures against.
pub enum TrustAnchor {
    /// Download from the envelope's `SigningCertURL` on every call.
    Remote {
        fetcher: Arc<dyn HttpFetcher>,
        timeout: Duration,
    },
    /// Always use this certificate and never touch the network.
    Pinned(Certificate),
}

pub struct TrustVerifier {
    anchor: TrustAnchor,
}

impl TrustVerifier {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self {
            anchor: TrustAnchor::Remote { fetcher, timeout },
        }
    }

    pub fn pinned(certificate: Certificate) -> Self {
        Self {
            anchor: TrustAnchor::Pinned(certificate),
        }
    }

    pub async fn verify(&self, envelope: &Envelope) -> Result<()> {
        let signature = general_purpose::STANDARD
            .decode(envelope.signature.as_bytes())
            .map_err(DecodeError::Base64)?;

        let certificate = match &self.anchor {
            TrustAnchor::Pinned(certificate) => {
                debug!("Verifying {} against pinned certificate", envelope.message_id);
                return verify_signature(certificate, &envelope.signable_bytes(), &signature);
            }
            TrustAnchor::Remote { fetcher, timeout } => {
                let url = signing_cert_url(&envelope.signing_cert_url)?;
                debug!("Fetching signing certificate from {}", url);
                let body = fetcher.get(&url, *timeout).await?;
                parse_certificate_pem(&body)?
            }
        };

        verify_signature(&certificate, &envelope.signable_bytes(), &signature)
    }
}

/// Validates a `SigningCertURL` without fetching it.
pub fn signing_cert_url(raw: &str) -> Result<Url> {
    if raw.is_empty() {
        return Err(TrustError::MissingUrl("SigningCertURL").into());
    }

    let url = Url::parse(raw).map_err(|e| TrustError::InvalidUrl("SigningCertURL", e))?;
    if url.scheme() != "https" {
        return Err(TrustError::InsecureScheme(url.scheme().to_string()).into());
    }

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    if !SNS_HOST.is_match(&host) {
        return Err(TrustError::UntrustedDomain(host).into());
    }

    Ok(url)
}

/// Decodes the first PEM block in `body` as an X.509 certificate.
pub fn parse_certificate_pem(body: &[u8]) -> Result<Certificate> {
    let block = pem::parse(body).map_err(|_| DecodeError::EmptyPem)?;
    Certificate::from_der(block.contents())
        .map_err(|e| DecodeError::Certificate(e.to_string()).into())
}

/// Checks an RSA PKCS#1 v1.5 SHA-1 signature (SignatureVersion 1) over
/// `message` with the certificate's public key.
pub fn verify_signature(certificate: &Certificate, message: &[u8], signature: &[u8]) -> Result<()> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| DecodeError::PublicKey(e.to_string()))?;
    let public_key =
        RsaPublicKey::from_public_key_der(&spki).map_err(|e| DecodeError::PublicKey(e.to_string()))?;

    let signature = Signature::try_from(signature).map_err(|_| TrustError::SignatureMismatch)?;
    VerifyingKey::<Sha1>::new(public_key)
        .verify(message, &signature)
        .map_err(|_| TrustError::SignatureMismatch.into())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::envelope::EnvelopeType;
    use crate::error::{Error, ErrorKind};
    use crate::http::testing::StubFetcher;

    fn envelope() -> Envelope {
        let mut envelope = Envelope {
            kind: EnvelopeType::Notification,
            message: r#"{"notificationType":"Bounce"}"#.to_string(),
            message_id: "da41e39f-ea4d-435a-b922-c6aae3915ebe".to_string(),
            timestamp: "2012-04-25T21:49:25.719Z".to_string(),
            topic_arn: "arn:aws:sns:us-east-1:123456789012:MyTopic".to_string(),
            subject: "test".to_string(),
            ..Default::default()
        };
        sign(&mut envelope);
        envelope
    }

    fn remote(fetcher: &Arc<StubFetcher>) -> TrustVerifier {
        TrustVerifier::new(fetcher.clone(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_verify_with_fetched_certificate() {
        let fetcher = Arc::new(StubFetcher::default().with(CERT_URL, CERT_PEM));
        remote(&fetcher).verify(&envelope()).await.unwrap();

        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], (CERT_URL.to_string(), Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_certificate_fetched_every_call() {
        let fetcher = Arc::new(StubFetcher::default().with(CERT_URL, CERT_PEM));
        let verifier = remote(&fetcher);
        verifier.verify(&envelope()).await.unwrap();
        verifier.verify(&envelope()).await.unwrap();
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_verify_with_pinned_certificate() {
        let mut envelope = envelope();
        envelope.signing_cert_url = String::new();
        TrustVerifier::pinned(certificate()).verify(&envelope).await.unwrap();
    }

    #[tokio::test]
    async fn test_openssl_signed_envelope() {
        let body = include_bytes!("../testdata/openssl_signed_envelope.json");
        let envelope = Envelope::from_slice(body).unwrap();
        TrustVerifier::pinned(certificate()).verify(&envelope).await.unwrap();
    }

    #[tokio::test]
    async fn test_tampering_any_signable_field_fails() {
        let verifier = TrustVerifier::pinned(certificate());
        let signed = envelope();
        let tamperings: [fn(&mut Envelope); 8] = [
            |e| e.message.push(' '),
            |e| e.message_id = "other".to_string(),
            |e| e.subject = "changed".to_string(),
            |e| e.subscribe_url = "https://sns.us-east-1.amazonaws.com/?Action=ConfirmSubscription".to_string(),
            |e| e.timestamp = "2012-04-25T21:49:25.720Z".to_string(),
            |e| e.token = "token".to_string(),
            |e| e.topic_arn.push('2'),
            |e| e.kind = EnvelopeType::SubscriptionConfirmation,
        ];
        for tamper in tamperings {
            let mut envelope = signed.clone();
            tamper(&mut envelope);
            let err = verifier.verify(&envelope).await.unwrap_err();
            assert!(matches!(err, Error::Trust(TrustError::SignatureMismatch)), "{err}");
        }
    }

    #[tokio::test]
    async fn test_unsigned_fields_can_change() {
        let verifier = TrustVerifier::pinned(certificate());
        let mut envelope = envelope();
        envelope.unsubscribe_url = "https://sns.us-east-1.amazonaws.com/?Action=Unsubscribe".to_string();
        envelope.signature_version = "2".to_string();
        verifier.verify(&envelope).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_signature() {
        let mut envelope = envelope();
        envelope.signature = "not base64!".to_string();
        let err = TrustVerifier::pinned(certificate()).verify(&envelope).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_bad_urls_rejected_before_fetch() {
        let fetcher = Arc::new(StubFetcher::default().with(CERT_URL, CERT_PEM));
        let verifier = remote(&fetcher);
        let cases = [
            ("", "SigningCertURL"),
            ("http://sns.us-east-1.amazonaws.com/cert.pem", "https"),
            ("https://evil.example.com/cert.pem", "invalid domain"),
            ("https://sns.us-east-1.amazonaws.com.evil.com/cert.pem", "invalid domain"),
            ("https://sns.ab.amazonaws.com/cert.pem", "invalid domain"),
            ("https://sns.us-east-1.amazonaws.com:8443/cert.pem", "invalid domain"),
            ("not a url", "SigningCertURL"),
        ];
        for (url, expected) in cases {
            let mut envelope = envelope();
            envelope.signing_cert_url = url.to_string();
            let err = verifier.verify(&envelope).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Trust, "{url}");
            assert!(err.to_string().contains(expected), "{url}: {err}");
        }
        assert_eq!(fetcher.request_count(), 0);
    }

    #[test]
    fn test_accepted_hosts() {
        for url in [
            "https://sns.us-east-1.amazonaws.com/cert.pem",
            "https://sns.cn-north-1.amazonaws.com.cn/cert.pem",
            "https://sns.eu-west-2.amazonaws.com:443/cert.pem",
        ] {
            assert!(signing_cert_url(url).is_ok(), "{url}");
        }
    }

    #[tokio::test]
    async fn test_fetched_body_without_pem() {
        let fetcher = Arc::new(StubFetcher::default().with(CERT_URL, "<html>not a cert</html>"));
        let err = remote(&fetcher).verify(&envelope()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::EmptyPem)), "{err}");
    }

    #[tokio::test]
    async fn test_fetched_pem_is_not_a_certificate() {
        let garbage = "-----BEGIN CERTIFICATE-----\nAAECAwQF\n-----END CERTIFICATE-----\n";
        let fetcher = Arc::new(StubFetcher::default().with(CERT_URL, garbage));
        let err = remote(&fetcher).verify(&envelope()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Certificate(_))), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_transport_error() {
        let fetcher = Arc::new(StubFetcher::default());
        let err = remote(&fetcher).verify(&envelope()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
