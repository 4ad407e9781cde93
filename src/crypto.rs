use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

/// Tenant data keys are always 256-bit.
pub const DATA_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ROOT_ENCRYPTION_KEY must be hex-encoded")]
    RootKeyNotHex,

    #[error("ROOT_ENCRYPTION_KEY must be 32 bytes (64 hex chars)")]
    RootKeyWrongLength,

    #[error("data key must be 32 bytes")]
    BadDataKey,

    #[error("encryption error")]
    EncryptFailed,

    #[error("decryption error")]
    DecryptFailed,

    #[error("ciphertext too short")]
    CiphertextTooShort,
}

/// Performs envelope encryption using AES-256-GCM.
///
/// A process-wide root key wraps per-tenant data keys; data keys encrypt the
/// tenant's secrets and tokens. The root key never leaves process memory.
pub struct Encryptor {
    root_key: [u8; DATA_KEY_LEN],
}

impl Encryptor {
    /// Creates an `Encryptor` from a 32-byte hex-encoded root key.
    pub fn new(root_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(root_key_hex).map_err(|_| CryptoError::RootKeyNotHex)?;
        let root_key: [u8; DATA_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::RootKeyWrongLength)?;
        Ok(Encryptor { root_key })
    }

    /// Generates a random 32-byte data key and returns it in both plaintext
    /// (for immediate use) and wrapped (for storage) form.
    pub fn generate_data_key(&self) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let key = generate_random::<DATA_KEY_LEN>();
        let wrapped = encrypt(&self.root_key, &key)?;
        Ok((key.to_vec(), wrapped))
    }

    /// Unwraps a stored data key using the root key.
    pub fn decrypt_data_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = decrypt(&self.root_key, wrapped)?;
        if key.len() != DATA_KEY_LEN {
            return Err(CryptoError::BadDataKey);
        }
        Ok(key)
    }

    /// Seals an opaque blob under the root key. Used for the OAuth state
    /// parameter: a tampered or forged state fails to open.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        encrypt(&self.root_key, plaintext)
    }

    /// Opens a blob previously produced by [`Encryptor::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        decrypt(&self.root_key, sealed)
    }
}

/// Encrypts plaintext using a tenant's plaintext data key.
pub fn encrypt_with_data_key(data_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data_key.len() != DATA_KEY_LEN {
        return Err(CryptoError::BadDataKey);
    }
    encrypt(data_key, plaintext)
}

/// Decrypts ciphertext using a tenant's plaintext data key.
pub fn decrypt_with_data_key(data_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data_key.len() != DATA_KEY_LEN {
        return Err(CryptoError::BadDataKey);
    }
    decrypt(data_key, ciphertext)
}

// Output layout: [nonce(12) | ciphertext+tag]. A fresh random nonce is drawn
// for every encryption; nonce reuse under the same key breaks GCM.
fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::EncryptFailed)?;
    let nonce_bytes = generate_random::<NONCE_LEN>();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut out = nonce_bytes.to_vec();
    out.extend(ciphertext);
    Ok(out)
}

fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_LEN {
        return Err(CryptoError::CiphertextTooShort);
    }
    let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::DecryptFailed)?;
    cipher
        .decrypt(nonce, &data[NONCE_LEN..])
        .map_err(|_| CryptoError::DecryptFailed)
}

pub fn generate_random<const LENGTH: usize>() -> [u8; LENGTH] {
    let mut buffer = [0u8; LENGTH];
    getrandom::getrandom(&mut buffer).expect("Failed to generate random bytes");
    buffer
}
