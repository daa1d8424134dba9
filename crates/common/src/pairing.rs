//! Setup-URI codec for pairing a new device.
//!
//! The URI carries `base64url([version][salt:16][iv:12][ciphertext])` where
//! the ciphertext is AES-GCM-256 over the JSON connection payload, keyed by
//! PBKDF2-SHA256 (100k rounds) of a user passphrase. Producing and reading
//! the URI is handled here; how it travels between devices is the host's
//! concern.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const SETUP_URI_PREFIX: &str = "obsidian://setup-sync-workers?data=";

const PAYLOAD_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;

/// The connection settings exchanged during pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingPayload {
    #[serde(rename = "serverUrl")]
    pub server_url: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "vaultId")]
    pub vault_id: String,
    pub version: u8,
}

impl PairingPayload {
    pub fn new(server_url: String, api_key: String, vault_id: String) -> Self {
        Self {
            server_url,
            api_key,
            vault_id,
            version: PAYLOAD_VERSION,
        }
    }
}

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("not a setup URI")]
    BadScheme,
    #[error("malformed setup payload")]
    Malformed,
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u8),
    #[error("decryption failed (wrong passphrase?)")]
    Decrypt,
    #[error("payload JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Encrypt `payload` under `passphrase` and wrap it in the setup URI.
pub fn encode_setup_uri(
    payload: &PairingPayload,
    passphrase: &str,
) -> Result<String, PairingError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    let mut rng = rand::rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| PairingError::Malformed)?;
    let plaintext = serde_json::to_vec(payload)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
        .map_err(|_| PairingError::Decrypt)?;

    let mut raw = Vec::with_capacity(1 + SALT_LEN + IV_LEN + ciphertext.len());
    raw.push(PAYLOAD_VERSION);
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&iv);
    raw.extend_from_slice(&ciphertext);

    Ok(format!("{SETUP_URI_PREFIX}{}", URL_SAFE_NO_PAD.encode(raw)))
}

/// Parse and decrypt a setup URI produced by [`encode_setup_uri`].
pub fn decode_setup_uri(uri: &str, passphrase: &str) -> Result<PairingPayload, PairingError> {
    let data = uri
        .strip_prefix(SETUP_URI_PREFIX)
        .ok_or(PairingError::BadScheme)?;
    let raw = URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|_| PairingError::Malformed)?;
    if raw.len() < 1 + SALT_LEN + IV_LEN + 1 {
        return Err(PairingError::Malformed);
    }
    let version = raw[0];
    if version != PAYLOAD_VERSION {
        return Err(PairingError::UnsupportedVersion(version));
    }
    let salt = &raw[1..1 + SALT_LEN];
    let iv = &raw[1 + SALT_LEN..1 + SALT_LEN + IV_LEN];
    let ciphertext = &raw[1 + SALT_LEN + IV_LEN..];

    let key = derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| PairingError::Malformed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| PairingError::Decrypt)?;

    Ok(serde_json::from_slice(&plaintext)?)
}
