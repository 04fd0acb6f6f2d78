use jsonwebtoken::{DecodingKey, EncodingKey};

use crate::config::Config;

/// HMAC key pair used to sign and verify session tokens.
#[derive(Clone)]
pub struct KeySet {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

impl KeySet {
    pub fn from_secret(secret: impl AsRef<[u8]>) -> KeySet {
        KeySet {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

#[derive(Clone)]
pub struct Security {
    pub jwt_keys: KeySet,
}

impl Security {
    pub fn load(config: &Config) -> Security {
        tracing::info!("Loading JWT signing secret...");
        if config.uses_default_secret() {
            tracing::warn!("JWT_SECRET isn't set. Using the development secret.");
        }

        Security {
            jwt_keys: KeySet::from_secret(config.jwt_secret.as_bytes()),
        }
    }
}
