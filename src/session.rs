//! Certificate-based session for the CLAMP API
//!
//! The session is established once per run and handed to the CLAMP transport
//! builder; nothing here is process-global.

use std::fs;
use std::path::Path;

use reqwest::Identity;
use sha2::{Digest, Sha256};

use crate::config::CertificateConfig;
use crate::error::{ClampError, Result};

#[derive(Clone)]
enum Material {
    Pkcs12 { der: Vec<u8>, password: String },
    Pem { cert: Vec<u8>, key: Vec<u8> },
}

/// Client credential used to authorize CLAMP calls
#[derive(Clone)]
pub struct Session {
    material: Material,
    fingerprint: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("fingerprint", &self.fingerprint).finish()
    }
}

impl Session {
    /// Load the configured certificate and check that it can be used as a TLS identity
    pub fn establish(config: &CertificateConfig) -> Result<Self> {
        let session = match (&config.pkcs12_path, &config.cert_path, &config.key_path) {
            (Some(p12), _, _) => {
                let password = std::env::var(&config.password_env).map_err(|_| {
                    ClampError::Certificate(format!(
                        "{} not set, needed to open {}",
                        config.password_env,
                        p12.display()
                    ))
                })?;
                Self::from_pkcs12(read(p12)?, password)?
            }
            (None, Some(cert), Some(key)) => Self::from_pem(read(cert)?, read(key)?)?,
            _ => {
                return Err(ClampError::Certificate(
                    "no pkcs12 bundle or PEM cert/key configured".to_string(),
                ));
            }
        };

        log::info!("Session established with certificate sha256:{}", session.fingerprint);
        Ok(session)
    }

    pub fn from_pkcs12(der: Vec<u8>, password: impl Into<String>) -> Result<Self> {
        let session = Self {
            fingerprint: fingerprint(&der),
            material: Material::Pkcs12 {
                der,
                password: password.into(),
            },
        };
        session.identity()?;
        Ok(session)
    }

    pub fn from_pem(cert: Vec<u8>, key: Vec<u8>) -> Result<Self> {
        let session = Self {
            fingerprint: fingerprint(&cert),
            material: Material::Pem { cert, key },
        };
        session.identity()?;
        Ok(session)
    }

    /// TLS identity for the reqwest client
    pub fn identity(&self) -> Result<Identity> {
        let identity = match &self.material {
            Material::Pkcs12 { der, password } => Identity::from_pkcs12_der(der, password),
            Material::Pem { cert, key } => Identity::from_pkcs8_pem(cert, key),
        };
        identity.map_err(|e| ClampError::Certificate(format!("unusable certificate: {}", e)))
    }

    /// Hex SHA-256 of the certificate bundle
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| ClampError::Certificate(format!("cannot read {}: {}", path.display(), e)))
}

fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint(b"abc");
        assert_eq!(fp, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_missing_file_is_certificate_error() {
        let config = CertificateConfig {
            cert_path: Some(PathBuf::from("/nonexistent/cert.pem")),
            key_path: Some(PathBuf::from("/nonexistent/cert.key")),
            ..Default::default()
        };
        let err = Session::establish(&config).unwrap_err();
        assert!(matches!(err, ClampError::Certificate(_)));
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_missing_password_env() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not a pkcs12 bundle").unwrap();
        let config = CertificateConfig {
            pkcs12_path: Some(file.path().to_path_buf()),
            password_env: "CLAMPR_TEST_PASSWORD_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = Session::establish(&config).unwrap_err();
        assert!(err.to_string().contains("CLAMPR_TEST_PASSWORD_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_garbage_bundle_rejected() {
        let err = Session::from_pkcs12(b"garbage".to_vec(), "secret").unwrap_err();
        assert!(matches!(err, ClampError::Certificate(_)));
    }

    #[test]
    fn test_nothing_configured() {
        let err = Session::establish(&CertificateConfig::default()).unwrap_err();
        assert!(matches!(err, ClampError::Certificate(_)));
    }
}
