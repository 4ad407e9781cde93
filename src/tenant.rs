use crate::crypto::{generate_random, CryptoError, Encryptor};
use crate::db::{DBConnection, DBError};
use crate::models::tenants::{NewTenant, Tenant};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TenantServiceError {
    // Opaque on purpose: "not found" is indistinguishable from any other
    // lookup failure so API keys cannot be enumerated.
    #[error("invalid API key")]
    InvalidApiKey,

    #[error(transparent)]
    Db(#[from] DBError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Tenant provisioning and API-key resolution.
pub struct TenantService {
    db: Arc<dyn DBConnection>,
    enc: Arc<Encryptor>,
}

impl TenantService {
    pub fn new(db: Arc<dyn DBConnection>, enc: Arc<Encryptor>) -> Self {
        TenantService { db, enc }
    }

    /// Provisions a new tenant, returning the raw API key (shown once) and
    /// the tenant id. The plaintext data key is discarded immediately; only
    /// the wrapped form is stored.
    pub fn create(&self) -> Result<(String, Uuid), TenantServiceError> {
        let raw_key = generate_api_key();
        let key_hash = hash_api_key(&raw_key);

        let (_, encrypted_data_key) = self.enc.generate_data_key()?;

        let tenant = self
            .db
            .create_tenant(NewTenant::new(key_hash, encrypted_data_key))?;

        Ok((raw_key, tenant.id))
    }

    /// Resolves a tenant from a raw API key.
    pub fn get_by_api_key(&self, raw_key: &str) -> Result<Tenant, TenantServiceError> {
        self.db
            .get_tenant_by_api_key_hash(&hash_api_key(raw_key))
            .map_err(|_| TenantServiceError::InvalidApiKey)
    }

    /// Unwraps and returns the tenant's plaintext data key. Not cached; every
    /// caller pays the unwrap.
    pub fn data_key(&self, tenant: &Tenant) -> Result<Vec<u8>, TenantServiceError> {
        Ok(self.enc.decrypt_data_key(&tenant.encrypted_data_key)?)
    }

    /// The process encryptor, also used to seal OAuth state parameters.
    pub fn encryptor(&self) -> &Encryptor {
        &self.enc
    }
}

fn hash_api_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

fn generate_api_key() -> String {
    hex::encode(generate_random::<32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubDB;

    const TEST_ROOT_KEY: &str =
        "0202020202020202020202020202020202020202020202020202020202020202";

    fn service(db: Arc<StubDB>) -> TenantService {
        let enc = Arc::new(Encryptor::new(TEST_ROOT_KEY).unwrap());
        TenantService::new(db, enc)
    }

    #[test]
    fn api_keys_are_64_hex_chars() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn hash_is_sha256_hex() {
        let hash = hash_api_key("test-key");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key("test-key"));
        assert_ne!(hash, hash_api_key("test-kez"));
    }

    #[test]
    fn create_stores_hash_not_raw_key() {
        let db = Arc::new(StubDB::new());
        let svc = service(db.clone());

        let (raw_key, tenant_id) = svc.create().unwrap();

        let stored = db.tenants.lock().unwrap();
        let row = stored.iter().find(|t| t.id == tenant_id).unwrap();
        assert_eq!(row.api_key_hash, hash_api_key(&raw_key));
        assert_ne!(row.api_key_hash, raw_key);
    }

    #[test]
    fn resolves_tenant_by_raw_key_and_rejects_others() {
        let db = Arc::new(StubDB::new());
        let svc = service(db);

        let (raw_key, tenant_id) = svc.create().unwrap();
        assert_eq!(svc.get_by_api_key(&raw_key).unwrap().id, tenant_id);

        let err = svc.get_by_api_key(&format!("{}x", raw_key)).unwrap_err();
        assert!(matches!(err, TenantServiceError::InvalidApiKey));
    }

    #[test]
    fn data_key_unwraps_to_32_bytes() {
        let db = Arc::new(StubDB::new());
        let svc = service(db);

        let (raw_key, _) = svc.create().unwrap();
        let tenant = svc.get_by_api_key(&raw_key).unwrap();
        assert_eq!(svc.data_key(&tenant).unwrap().len(), 32);
    }
}
