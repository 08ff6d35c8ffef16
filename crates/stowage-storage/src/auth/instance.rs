//! Instance-principal credential discovery.
//!
//! When the adapter runs on an OCI compute instance with no static key
//! material, signing credentials come from the local instance metadata
//! service: the region from the instance document, and the identity
//! certificate plus private key from the identity endpoints. The
//! resulting signer is keyed as `{tenancy}/fed-x509/{fingerprint}`.

use std::time::Duration;

use http::header::AUTHORIZATION;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::auth::signer::RequestSigner;
use crate::traits::{StorageError, StorageResult};

const METADATA_BASE: &str = "http://169.254.169.254/opc/v2";
const METADATA_AUTHORIZATION: &str = "Bearer Oracle";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDocument {
    region: String,
    canonical_region_name: Option<String>,
}

pub(crate) struct InstanceIdentity {
    pub region: String,
    pub signer: RequestSigner,
}

/// Discover signing material from the metadata service. Every failure —
/// unreachable endpoint, non-success status, unusable certificate —
/// surfaces as `AuthResolution`; the bounded timeouts guarantee the
/// call cannot hang.
pub(crate) async fn discover() -> StorageResult<InstanceIdentity> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| StorageError::AuthResolution(format!("metadata client: {}", e)))?;

    let document: InstanceDocument =
        serde_json::from_str(&fetch(&client, "instance/").await?).map_err(|e| {
            StorageError::AuthResolution(format!("malformed instance document: {}", e))
        })?;
    let cert_pem = fetch(&client, "identity/cert.pem").await?;
    let key_pem = fetch(&client, "identity/key.pem").await?;

    let cert = pem::parse(&cert_pem)
        .map_err(|e| StorageError::AuthResolution(format!("invalid identity certificate: {}", e)))?;
    let tenancy = tenancy_from_cert(cert.contents()).ok_or_else(|| {
        StorageError::AuthResolution("identity certificate carries no tenancy".to_string())
    })?;
    let fingerprint = colon_hex(&Sha1::digest(cert.contents()));
    let key_id = format!("{}/fed-x509/{}", tenancy, fingerprint);
    let signer = RequestSigner::from_pem(key_id, &key_pem, None)?;

    let region = document.canonical_region_name.unwrap_or(document.region);
    tracing::info!(region = %region, "resolved instance-principal identity");

    Ok(InstanceIdentity { region, signer })
}

async fn fetch(client: &reqwest::Client, path: &str) -> StorageResult<String> {
    let url = format!("{}/{}", METADATA_BASE, path);
    let response = client
        .get(&url)
        .header(AUTHORIZATION, METADATA_AUTHORIZATION)
        .send()
        .await
        .map_err(|e| StorageError::AuthResolution(format!("instance metadata unreachable: {}", e)))?;
    if !response.status().is_success() {
        return Err(StorageError::AuthResolution(format!(
            "instance metadata returned {} for {}",
            response.status(),
            path
        )));
    }
    response
        .text()
        .await
        .map_err(|e| StorageError::AuthResolution(format!("instance metadata read: {}", e)))
}

/// The identity certificate carries the tenancy OCID in its subject as
/// `opc-tenant:<ocid>`; scan the DER for that marker.
fn tenancy_from_cert(der: &[u8]) -> Option<String> {
    const MARKER: &[u8] = b"opc-tenant:";
    let at = der.windows(MARKER.len()).position(|window| window == MARKER)?;
    let rest = &der[at + MARKER.len()..];
    let end = rest
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_')))
        .unwrap_or(rest.len());
    (end > 0).then(|| String::from_utf8_lossy(&rest[..end]).into_owned())
}

fn colon_hex(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tenancy_from_subject_bytes() {
        let mut der = b"\x30\x82junk".to_vec();
        der.extend_from_slice(b"opc-tenant:ocid1.tenancy.oc1..aaaa");
        der.push(b',');
        assert_eq!(
            tenancy_from_cert(&der).as_deref(),
            Some("ocid1.tenancy.oc1..aaaa")
        );
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(tenancy_from_cert(b"no marker here").is_none());
    }

    #[test]
    fn fingerprint_is_colon_separated_uppercase_hex() {
        assert_eq!(colon_hex(&[0x0a, 0xff, 0x00]), "0A:FF:00");
    }
}
