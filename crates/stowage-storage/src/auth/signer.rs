//! Request signing.
//!
//! OCI authenticates every request with an HTTP signature (draft-cavage,
//! `rsa-sha256`): `date`, `(request-target)` and `host` are always
//! covered; body-carrying requests additionally cover `content-length`,
//! `content-type` and `x-content-sha256`.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use url::Url;

use crate::backend::BackendError;
use crate::traits::{StorageError, StorageResult};

const X_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-content-sha256");

/// Body facts covered by the signature of a `put`.
#[derive(Clone, Debug)]
pub struct SignedBody {
    pub content_type: String,
    pub content_length: u64,
    pub content_sha256: String,
}

impl SignedBody {
    pub fn from_bytes(data: &[u8], content_type: &str) -> Self {
        SignedBody {
            content_type: content_type.to_string(),
            content_length: data.len() as u64,
            content_sha256: BASE64.encode(Sha256::digest(data)),
        }
    }
}

/// Signing credential bound to one key id.
pub struct RequestSigner {
    key_id: String,
    key: SigningKey<Sha256>,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Build a signer from PEM key material. Accepts PKCS#1, PKCS#8 and
    /// passphrase-protected PKCS#8 blocks.
    pub fn from_pem(key_id: String, pem_text: &str, passphrase: Option<&str>) -> StorageResult<Self> {
        let key = parse_private_key(pem_text, passphrase)?;
        Ok(Self::from_key(key_id, key))
    }

    pub fn from_key(key_id: String, key: RsaPrivateKey) -> Self {
        RequestSigner { key_id, key: SigningKey::new(key) }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Produce the signed headers for one request. The returned map
    /// carries `date`, `authorization` and, for body-carrying requests,
    /// the content headers the signature covers.
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&SignedBody>,
    ) -> Result<HeaderMap, BackendError> {
        let host = url
            .host_str()
            .ok_or_else(|| BackendError::Auth(format!("url has no host: {}", url)))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut covered = vec!["date", "(request-target)", "host"];
        let mut lines = vec![
            format!("date: {}", date),
            format!("(request-target): {} {}", method.as_str().to_ascii_lowercase(), target),
            format!("host: {}", authority),
        ];

        let mut headers = HeaderMap::new();
        headers.insert(DATE, header_value(&date)?);

        if let Some(body) = body {
            covered.extend(["content-length", "content-type", "x-content-sha256"]);
            lines.push(format!("content-length: {}", body.content_length));
            lines.push(format!("content-type: {}", body.content_type));
            lines.push(format!("x-content-sha256: {}", body.content_sha256));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.content_length));
            headers.insert(CONTENT_TYPE, header_value(&body.content_type)?);
            headers.insert(X_CONTENT_SHA256, header_value(&body.content_sha256)?);
        }

        let signature = self.key.sign(lines.join("\n").as_bytes());
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            covered.join(" "),
            BASE64.encode(signature.to_bytes())
        );
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(value)
        .map_err(|e| BackendError::Auth(format!("invalid header value: {}", e)))
}

fn parse_private_key(pem_text: &str, passphrase: Option<&str>) -> StorageResult<RsaPrivateKey> {
    let auth_err = |e: &dyn fmt::Display| StorageError::AuthResolution(format!("invalid private key: {}", e));

    let block = pem::parse(pem_text).map_err(|e| auth_err(&e))?;
    match block.tag() {
        "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(block.contents()).map_err(|e| auth_err(&e)),
        "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_der(block.contents()).map_err(|e| auth_err(&e)),
        "ENCRYPTED PRIVATE KEY" => {
            let passphrase = passphrase.ok_or_else(|| {
                StorageError::AuthResolution(
                    "private key is encrypted but no passphrase is configured".to_string(),
                )
            })?;
            let info = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents())
                .map_err(|e| auth_err(&e))?;
            let document = info.decrypt(passphrase).map_err(|e| auth_err(&e))?;
            RsaPrivateKey::from_pkcs8_der(document.as_bytes()).map_err(|e| auth_err(&e))
        }
        other => Err(StorageError::AuthResolution(format!(
            "unsupported private key block: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::signature::{Keypair, Verifier};

    fn test_key() -> RsaPrivateKey {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 1024).unwrap()
    }

    fn extract(auth: &str, field: &str) -> String {
        let start = auth.find(&format!("{}=\"", field)).unwrap() + field.len() + 2;
        auth[start..].split('"').next().unwrap().to_string()
    }

    #[test]
    fn get_signature_covers_base_headers_and_verifies() {
        let key = test_key();
        let signer = RequestSigner::from_key("t/u/fp".to_string(), key.clone());
        let url = Url::parse("https://ns.objectstorage.r1.example.com/n/ns/b/b/o/k?x=1").unwrap();

        let headers = signer.sign(&Method::GET, &url, None).unwrap();
        let auth = headers[AUTHORIZATION].to_str().unwrap().to_string();
        assert_eq!(extract(&auth, "keyId"), "t/u/fp");
        assert_eq!(extract(&auth, "headers"), "date (request-target) host");

        let date = headers[DATE].to_str().unwrap();
        let signing_string = format!(
            "date: {}\n(request-target): get /n/ns/b/b/o/k?x=1\nhost: ns.objectstorage.r1.example.com",
            date
        );
        let signature_bytes = BASE64.decode(extract(&auth, "signature")).unwrap();
        let signature = rsa::pkcs1v15::Signature::try_from(signature_bytes.as_slice()).unwrap();
        let verifier = SigningKey::<Sha256>::new(key).verifying_key();
        verifier.verify(signing_string.as_bytes(), &signature).unwrap();
    }

    #[test]
    fn put_signature_covers_content_headers() {
        let signer = RequestSigner::from_key("t/u/fp".to_string(), test_key());
        let url = Url::parse("https://host.example.com/n/ns/b/b/o/k").unwrap();
        let body = SignedBody::from_bytes(b"payload", "image/webp");

        let headers = signer.sign(&Method::PUT, &url, Some(&body)).unwrap();
        let auth = headers[AUTHORIZATION].to_str().unwrap();
        assert_eq!(
            extract(auth, "headers"),
            "date (request-target) host content-length content-type x-content-sha256"
        );
        assert_eq!(headers[CONTENT_TYPE], "image/webp");
        assert_eq!(headers[CONTENT_LENGTH], "7");
        assert_eq!(
            headers[X_CONTENT_SHA256].to_str().unwrap(),
            BASE64.encode(Sha256::digest(b"payload"))
        );
    }

    #[test]
    fn pkcs8_pem_round_trips_through_from_pem() {
        let key = test_key();
        let pem_text = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let signer = RequestSigner::from_pem("id".to_string(), &pem_text, None).unwrap();
        assert_eq!(signer.key_id(), "id");
    }

    #[test]
    fn unsupported_block_is_rejected() {
        let err = RequestSigner::from_pem(
            "id".to_string(),
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::AuthResolution(_)));
    }
}
