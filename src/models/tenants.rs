use crate::models::schema::tenants;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TenantError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// An isolated customer workspace. The raw API key is never stored; only its
/// SHA-256 hex digest. `encrypted_data_key` is the tenant's 32-byte data key
/// wrapped by the process root key.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = tenants)]
pub struct Tenant {
    pub id: Uuid,
    pub api_key_hash: String,
    #[serde(skip_serializing)]
    pub encrypted_data_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn get_by_id(conn: &mut PgConnection, lookup_id: Uuid) -> Result<Option<Tenant>, TenantError> {
        tenants::table
            .filter(tenants::id.eq(lookup_id))
            .first::<Tenant>(conn)
            .optional()
            .map_err(TenantError::DatabaseError)
    }

    pub fn get_by_api_key_hash(
        conn: &mut PgConnection,
        lookup_hash: &str,
    ) -> Result<Option<Tenant>, TenantError> {
        tenants::table
            .filter(tenants::api_key_hash.eq(lookup_hash))
            .first::<Tenant>(conn)
            .optional()
            .map_err(TenantError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = tenants)]
pub struct NewTenant {
    pub id: Uuid,
    pub api_key_hash: String,
    pub encrypted_data_key: Vec<u8>,
}

impl NewTenant {
    pub fn new(api_key_hash: String, encrypted_data_key: Vec<u8>) -> Self {
        NewTenant {
            id: Uuid::new_v4(),
            api_key_hash,
            encrypted_data_key,
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<Tenant, TenantError> {
        diesel::insert_into(tenants::table)
            .values(self)
            .get_result::<Tenant>(conn)
            .map_err(TenantError::DatabaseError)
    }
}
