//! Credential resolution.
//!
//! Exactly one authentication strategy is selected per resolution,
//! evaluated in order: an explicit key pair from the configuration, a
//! profile from an OCI config file, and finally instance-principal
//! discovery. A partially supplied key pair fails immediately —
//! resolution never guesses a fallback from an inconsistent explicit
//! config, and automatic discovery is only attempted when no key-pair
//! field is set at all.

pub mod config_file;
mod instance;
pub mod signer;

use std::sync::Arc;

use stowage_core::StorageConfig;

use crate::traits::{StorageError, StorageResult};
use self::signer::RequestSigner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialStrategy {
    ApiKey,
    ConfigFile,
    InstancePrincipal,
}

impl CredentialStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStrategy::ApiKey => "api_key",
            CredentialStrategy::ConfigFile => "config_file",
            CredentialStrategy::InstancePrincipal => "instance_principal",
        }
    }
}

/// A resolved client handle: one signing credential bound to a region.
/// Stateless with respect to individual operations.
#[derive(Debug)]
pub struct ClientHandle {
    pub strategy: CredentialStrategy,
    pub region: Option<String>,
    pub signer: Arc<RequestSigner>,
}

pub async fn resolve(config: &StorageConfig) -> StorageResult<ClientHandle> {
    let key_pair = [
        ("tenancy", config.tenancy.is_some()),
        ("user", config.user.is_some()),
        ("fingerprint", config.fingerprint.is_some()),
        ("private key", config.private_key_pem.is_some()),
    ];
    let present = key_pair.iter().filter(|(_, set)| *set).count();

    let handle = if present == key_pair.len() {
        resolve_api_key(config)?
    } else if present > 0 {
        let missing: Vec<&str> = key_pair
            .iter()
            .filter(|(_, set)| !set)
            .map(|(name, _)| *name)
            .collect();
        return Err(StorageError::AuthResolution(format!(
            "partial key-pair configuration, missing: {}",
            missing.join(", ")
        )));
    } else if let Some(path) = candidate_config_file(config) {
        resolve_config_file(config, &path)?
    } else {
        let identity = instance::discover().await?;
        ClientHandle {
            strategy: CredentialStrategy::InstancePrincipal,
            region: Some(normalize_region(&identity.region)),
            signer: Arc::new(identity.signer),
        }
    };

    tracing::info!(
        strategy = handle.strategy.as_str(),
        region = handle.region.as_deref().unwrap_or("<none>"),
        "resolved object storage credentials"
    );
    Ok(handle)
}

fn resolve_api_key(config: &StorageConfig) -> StorageResult<ClientHandle> {
    // Presence of all four fields is checked by the caller.
    let (tenancy, user, fingerprint, pem) = match (
        &config.tenancy,
        &config.user,
        &config.fingerprint,
        &config.private_key_pem,
    ) {
        (Some(t), Some(u), Some(f), Some(p)) => (t, u, f, p),
        _ => {
            return Err(StorageError::AuthResolution(
                "incomplete key-pair configuration".to_string(),
            ))
        }
    };

    let key_id = format!("{}/{}/{}", tenancy, user, fingerprint);
    let signer = RequestSigner::from_pem(key_id, pem, config.passphrase.as_deref())?;
    Ok(ClientHandle {
        strategy: CredentialStrategy::ApiKey,
        region: config.region.as_deref().map(normalize_region),
        signer: Arc::new(signer),
    })
}

/// An explicitly configured config file is always used (and its absence
/// is an error); the conventional default location is only consulted
/// when the file actually exists.
fn candidate_config_file(config: &StorageConfig) -> Option<std::path::PathBuf> {
    if let Some(path) = &config.config_file {
        return Some(path.clone());
    }
    config_file::default_path().filter(|path| path.exists())
}

fn resolve_config_file(config: &StorageConfig, path: &std::path::Path) -> StorageResult<ClientHandle> {
    let path = config_file::expand_home(path);
    let profile = config_file::load_profile(&path, &config.profile)?;

    let (tenancy, user, fingerprint, key_file) = match (
        profile.tenancy,
        profile.user,
        profile.fingerprint,
        profile.key_file,
    ) {
        (Some(t), Some(u), Some(f), Some(k)) => (t, u, f, k),
        _ => {
            return Err(StorageError::AuthResolution(format!(
                "profile [{}] in {} is incomplete",
                config.profile,
                path.display()
            )))
        }
    };

    let key_path = config_file::expand_home(&key_file);
    let pem = std::fs::read_to_string(&key_path).map_err(|e| {
        StorageError::AuthResolution(format!("cannot read key file {}: {}", key_path.display(), e))
    })?;

    let key_id = format!("{}/{}/{}", tenancy, user, fingerprint);
    let passphrase = config.passphrase.as_deref().or(profile.pass_phrase.as_deref());
    let signer = RequestSigner::from_pem(key_id, &pem, passphrase)?;

    let region = config
        .region
        .as_deref()
        .or(profile.region.as_deref())
        .map(normalize_region);
    Ok(ClientHandle {
        strategy: CredentialStrategy::ConfigFile,
        region,
        signer: Arc::new(signer),
    })
}

/// Normalize a region identifier to its canonical form. Short airport
/// codes accepted by the classic SDKs map to full region names;
/// anything else is trimmed and lowercased.
pub fn normalize_region(raw: &str) -> String {
    let region = raw.trim().to_ascii_lowercase();
    match region.as_str() {
        "phx" => "us-phoenix-1",
        "iad" => "us-ashburn-1",
        "fra" => "eu-frankfurt-1",
        "lhr" => "uk-london-1",
        "ams" => "eu-amsterdam-1",
        "yyz" => "ca-toronto-1",
        "nrt" => "ap-tokyo-1",
        "bom" => "ap-mumbai-1",
        "syd" => "ap-sydney-1",
        "gru" => "sa-saopaulo-1",
        _ => return region,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use std::io::Write;

    fn test_key_pem() -> String {
        let mut rng = rand::thread_rng();
        let key = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
    }

    fn base_config() -> StorageConfig {
        StorageConfig {
            bucket: "b".to_string(),
            namespace: "ns".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_key_pair_selects_the_api_key_strategy() {
        let mut config = base_config();
        config.tenancy = Some("ocid1.tenancy.oc1..t".to_string());
        config.user = Some("ocid1.user.oc1..u".to_string());
        config.fingerprint = Some("aa:bb".to_string());
        config.private_key_pem = Some(test_key_pem());
        config.region = Some("IAD".to_string());

        let handle = resolve(&config).await.unwrap();
        assert_eq!(handle.strategy, CredentialStrategy::ApiKey);
        assert_eq!(handle.region.as_deref(), Some("us-ashburn-1"));
        assert_eq!(
            handle.signer.key_id(),
            "ocid1.tenancy.oc1..t/ocid1.user.oc1..u/aa:bb"
        );
    }

    #[tokio::test]
    async fn partial_key_pair_fails_fast_without_discovery() {
        let mut config = base_config();
        config.tenancy = Some("ocid1.tenancy.oc1..t".to_string());
        config.user = Some("ocid1.user.oc1..u".to_string());

        let err = resolve(&config).await.unwrap_err();
        match err {
            StorageError::AuthResolution(message) => {
                assert!(message.contains("partial key-pair"));
                assert!(message.contains("fingerprint"));
                assert!(message.contains("private key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn config_file_profile_selects_the_config_file_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        std::fs::write(&key_path, test_key_pem()).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[DEFAULT]\ntenancy=t\nuser=u\nfingerprint=aa:bb\nkey_file={}\nregion=fra",
            key_path.display()
        )
        .unwrap();

        let mut config = base_config();
        config.config_file = Some(file.path().to_path_buf());

        let handle = resolve(&config).await.unwrap();
        assert_eq!(handle.strategy, CredentialStrategy::ConfigFile);
        assert_eq!(handle.region.as_deref(), Some("eu-frankfurt-1"));
        assert_eq!(handle.signer.key_id(), "t/u/aa:bb");
    }

    #[tokio::test]
    async fn incomplete_profile_is_an_error_not_a_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[DEFAULT]\ntenancy=t\nuser=u").unwrap();

        let mut config = base_config();
        config.config_file = Some(file.path().to_path_buf());

        let err = resolve(&config).await.unwrap_err();
        assert!(matches!(err, StorageError::AuthResolution(_)));
    }

    #[test]
    fn region_aliases_normalize_to_canonical_names() {
        assert_eq!(normalize_region("PHX"), "us-phoenix-1");
        assert_eq!(normalize_region(" iad "), "us-ashburn-1");
        assert_eq!(normalize_region("eu-zurich-1"), "eu-zurich-1");
        assert_eq!(normalize_region("US-ASHBURN-1"), "us-ashburn-1");
    }
}
