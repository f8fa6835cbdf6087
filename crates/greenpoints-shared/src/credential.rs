use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::constants::{CREDENTIAL_SALT_SIZE, KDF_CONTEXT_CREDENTIAL};
use crate::error::ValidationError;

/// A stored security key: random salt plus a BLAKE3 derived key.
///
/// The plaintext secret never reaches the database. Encoded as
/// `<salt hex>$<key hex>` for storage and snapshots.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Credential {
    salt: [u8; CREDENTIAL_SALT_SIZE],
    key: [u8; 32],
}

impl Credential {
    /// Derive a credential for `secret` with a fresh salt.
    pub fn derive(secret: &str) -> Result<Self, ValidationError> {
        if secret.is_empty() {
            return Err(ValidationError::EmptySecret);
        }
        let mut salt = [0u8; CREDENTIAL_SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Ok(Self {
            salt,
            key: derive_key(&salt, secret),
        })
    }

    /// Constant-time check of `secret` against the stored key.
    pub fn verify(&self, secret: &str) -> bool {
        let candidate = derive_key(&self.salt, secret);
        candidate[..].ct_eq(&self.key[..]).unwrap_u8() == 1
    }

    pub fn to_encoded(&self) -> String {
        format!("{}${}", hex::encode(self.salt), hex::encode(self.key))
    }

    pub fn from_encoded(encoded: &str) -> Result<Self, ValidationError> {
        let (salt_hex, key_hex) = encoded
            .split_once('$')
            .ok_or(ValidationError::CredentialEncoding)?;

        let mut salt = [0u8; CREDENTIAL_SALT_SIZE];
        hex::decode_to_slice(salt_hex, &mut salt)
            .map_err(|_| ValidationError::CredentialEncoding)?;

        let mut key = [0u8; 32];
        hex::decode_to_slice(key_hex, &mut key)
            .map_err(|_| ValidationError::CredentialEncoding)?;

        Ok(Self { salt, key })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

impl TryFrom<String> for Credential {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_encoded(&value)
    }
}

impl From<Credential> for String {
    fn from(c: Credential) -> Self {
        c.to_encoded()
    }
}

fn derive_key(salt: &[u8], secret: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_CREDENTIAL);
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let cred = Credential::derive("password123").unwrap();
        assert!(cred.verify("password123"));
        assert!(!cred.verify("password124"));
        assert!(!cred.verify(""));
    }

    #[test]
    fn test_salts_differ() {
        let a = Credential::derive("same").unwrap();
        let b = Credential::derive("same").unwrap();
        assert_ne!(a.to_encoded(), b.to_encoded());
        assert!(a.verify("same") && b.verify("same"));
    }

    #[test]
    fn test_encoding() {
        let cred = Credential::derive("k3y").unwrap();
        let restored = Credential::from_encoded(&cred.to_encoded()).unwrap();
        assert!(restored.verify("k3y"));

        assert!(Credential::from_encoded("nodollar").is_err());
        assert!(Credential::from_encoded("zz$00").is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            Credential::derive("").unwrap_err(),
            ValidationError::EmptySecret
        );
    }

    #[test]
    fn test_debug_hides_material() {
        let cred = Credential::derive("s").unwrap();
        assert_eq!(format!("{cred:?}"), "Credential(..)");
    }
}
