//! Tenant signing-secret management
//!
//! Each tenant carries a current signing secret and, during a rotation
//! grace period, a staged next secret. The guard tries both so rotation
//! never drops in-flight traffic.

use crate::{time, Error, Result};
use rand::Rng;
use sqlx::SqlitePool;

/// Active signing secrets for one tenant (current, plus staged next)
#[derive(Debug, Clone)]
pub struct TenantSecrets {
    pub current: String,
    pub next: Option<String>,
}

/// Generate a random 32-byte secret, hex-encoded
fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Create a tenant with a fresh signing secret, returning the secret
///
/// Fails with `InvalidInput` if the tenant already exists.
pub async fn create_tenant(pool: &SqlitePool, tenant_id: &str) -> Result<String> {
    let secret = generate_secret();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO tenants (tenant_id, signing_secret, created_at) VALUES (?, ?, ?)",
    )
    .bind(tenant_id)
    .bind(&secret)
    .bind(time::now())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InvalidInput(format!(
            "Tenant already exists: {}",
            tenant_id
        )));
    }
    Ok(secret)
}

/// Load the active secrets for a tenant, or None if unknown
pub async fn get_tenant_secrets(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<Option<TenantSecrets>> {
    let row: Option<(String, Option<String>)> = sqlx::query_as(
        "SELECT signing_secret, next_signing_secret FROM tenants WHERE tenant_id = ?",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(current, next)| TenantSecrets { current, next }))
}

/// Stage a fresh next secret for rotation, returning it
pub async fn rotate_tenant_secret(pool: &SqlitePool, tenant_id: &str) -> Result<String> {
    let next = generate_secret();
    let result = sqlx::query(
        "UPDATE tenants SET next_signing_secret = ?, rotated_at = ? WHERE tenant_id = ?",
    )
    .bind(&next)
    .bind(time::now())
    .bind(tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Tenant not found: {}", tenant_id)));
    }
    Ok(next)
}

/// Promote the staged next secret to current, ending the grace period
pub async fn promote_tenant_secret(pool: &SqlitePool, tenant_id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE tenants SET signing_secret = next_signing_secret, \
         next_signing_secret = NULL, rotated_at = ? \
         WHERE tenant_id = ? AND next_signing_secret IS NOT NULL",
    )
    .bind(time::now())
    .bind(tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InvalidInput(format!(
            "Tenant has no staged secret to promote: {}",
            tenant_id
        )));
    }
    Ok(())
}
