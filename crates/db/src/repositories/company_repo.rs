//! Repository for the `companies` table.

use nfse_core::cnpj;
use nfse_core::types::DbId;
use sqlx::PgPool;

use crate::models::Company;

/// Column list for `companies` queries.
const COMPANY_COLUMNS: &str = "\
    id, name, tax_id, active, last_sync_at, \
    created_at, updated_at";

/// Read access to provisioned companies plus the sync timestamp.
pub struct CompanyRepo;

impl CompanyRepo {
    /// All companies enabled for synchronization.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Company>, sqlx::Error> {
        let query = format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE active ORDER BY name"
        );
        sqlx::query_as::<_, Company>(&query).fetch_all(pool).await
    }

    /// Find a company by CNPJ, accepting either the punctuated or the
    /// raw stored form.
    pub async fn find_by_tax_id(
        pool: &PgPool,
        tax_id: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        let (formatted, raw) = cnpj::both_forms(tax_id);
        let query = format!(
            "SELECT {COMPANY_COLUMNS} FROM companies \
             WHERE tax_id IN ($1, $2) \
             ORDER BY created_at LIMIT 1"
        );
        sqlx::query_as::<_, Company>(&query)
            .bind(formatted)
            .bind(raw)
            .fetch_optional(pool)
            .await
    }

    /// Stamp a successful sync pass.
    pub async fn touch_last_sync(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE companies SET last_sync_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
