//! Terminology repository - PostgreSQL storage for code system hierarchies
//!
//! Tables:
//! - `term_code_systems` (one row per canonical URI, with the current version pointer)
//! - `term_code_system_versions` (one row per committed resource revision)
//! - `term_concepts` / `term_concept_links` (the concept DAG of each version)

use super::traits::{TerminologyStore, TerminologyTransaction};
use crate::{
    models::{CodeSystemRecord, Concept, StoredConcept, StoredLink, VersionRecord},
    Error, Result,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

const CONCEPT_COLUMNS: &str = "c.id, c.code_system_version_id, c.code, c.display, c.is_abstract";

fn code_system_from_row(row: &PgRow) -> CodeSystemRecord {
    CodeSystemRecord {
        pid: row.get("id"),
        uri: row.get("code_system_uri"),
        resource_id: row.get("resource_id"),
        current_version: row.get("current_version_id"),
    }
}

fn version_from_row(row: &PgRow) -> VersionRecord {
    VersionRecord {
        pid: row.get("id"),
        code_system_pid: row.get("code_system_id"),
        resource_id: row.get("resource_id"),
        resource_version_id: row.get("resource_version_id"),
    }
}

fn concept_from_row(row: &PgRow) -> StoredConcept {
    StoredConcept {
        pid: row.get("id"),
        version_pid: row.get("code_system_version_id"),
        code: row.get("code"),
        display: row.get("display"),
        is_abstract: row.get("is_abstract"),
    }
}

/// Repository for code system hierarchies
#[derive(Clone)]
pub struct PostgresTerminologyStore {
    pool: PgPool,
}

impl PostgresTerminologyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TerminologyStore for PostgresTerminologyStore {
    type Transaction = PostgresTerminologyTransaction;

    async fn begin_transaction(&self) -> Result<Self::Transaction> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        Ok(PostgresTerminologyTransaction::new(tx))
    }

    async fn find_code_system_by_uri(&self, uri: &str) -> Result<Option<CodeSystemRecord>> {
        let row = sqlx::query(
            "SELECT id, code_system_uri, resource_id, current_version_id
             FROM term_code_systems
             WHERE code_system_uri = $1",
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(code_system_from_row))
    }

    async fn find_version(
        &self,
        resource_id: &str,
        resource_version_id: i32,
    ) -> Result<Option<VersionRecord>> {
        let row = sqlx::query(
            "SELECT id, code_system_id, resource_id, resource_version_id
             FROM term_code_system_versions
             WHERE resource_id = $1 AND resource_version_id = $2
             ORDER BY id DESC
             LIMIT 1",
        )
        .bind(resource_id)
        .bind(resource_version_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(version_from_row))
    }

    async fn find_version_by_pid(&self, version_pid: i64) -> Result<Option<VersionRecord>> {
        let row = sqlx::query(
            "SELECT id, code_system_id, resource_id, resource_version_id
             FROM term_code_system_versions
             WHERE id = $1",
        )
        .bind(version_pid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(version_from_row))
    }

    async fn find_concept_by_code(
        &self,
        version_pid: i64,
        code: &str,
    ) -> Result<Option<StoredConcept>> {
        let row = sqlx::query(&format!(
            "SELECT {CONCEPT_COLUMNS}
             FROM term_concepts c
             WHERE c.code_system_version_id = $1 AND c.code = $2
             ORDER BY c.id
             LIMIT 1"
        ))
        .bind(version_pid)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(concept_from_row))
    }

    async fn find_parents(&self, concept_pid: i64) -> Result<Vec<StoredConcept>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONCEPT_COLUMNS}
             FROM term_concept_links l
             JOIN term_concepts c ON c.id = l.parent_id
             WHERE l.child_id = $1
             ORDER BY c.id"
        ))
        .bind(concept_pid)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(concept_from_row).collect())
    }

    async fn find_children(&self, concept_pid: i64) -> Result<Vec<StoredConcept>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONCEPT_COLUMNS}
             FROM term_concept_links l
             JOIN term_concepts c ON c.id = l.child_id
             WHERE l.parent_id = $1
             ORDER BY c.id"
        ))
        .bind(concept_pid)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(concept_from_row).collect())
    }

    async fn list_concepts(&self, version_pid: i64) -> Result<Vec<StoredConcept>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONCEPT_COLUMNS}
             FROM term_concepts c
             WHERE c.code_system_version_id = $1
             ORDER BY c.id"
        ))
        .bind(version_pid)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(concept_from_row).collect())
    }

    async fn list_links(&self, version_pid: i64) -> Result<Vec<StoredLink>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT parent_id, child_id
             FROM term_concept_links
             WHERE code_system_version_id = $1
             ORDER BY parent_id, child_id",
        )
        .bind(version_pid)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|(parent_pid, child_pid)| StoredLink {
                parent_pid,
                child_pid,
            })
            .collect())
    }
}

/// PostgreSQL transaction for a version commit
pub struct PostgresTerminologyTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTerminologyTransaction {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Get mutable reference to transaction
    pub(crate) fn tx_mut(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_else(|| {
            Error::Internal("Transaction already committed or rolled back".to_string())
        })
    }
}

#[async_trait]
impl TerminologyTransaction for PostgresTerminologyTransaction {
    async fn commit(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal("Transaction already committed".to_string()))?;

        tx.commit().await.map_err(Error::Database)
    }

    async fn rollback(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal("Transaction already rolled back".to_string()))?;

        tx.rollback().await.map_err(Error::Database)
    }

    async fn acquire_commit_lock(&mut self, uri: &str, resource_id: &str) -> Result<()> {
        // Fixed acquisition order so two commits never wait on each other crosswise.
        // Keys are hashed server side to stay stable across builds.
        let mut keys = [format!("uri:{uri}"), format!("resource:{resource_id}")];
        keys.sort();

        let tx = self.tx_mut()?;
        for key in &keys {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(key)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
        }

        Ok(())
    }

    async fn find_code_system_by_uri(&mut self, uri: &str) -> Result<Option<CodeSystemRecord>> {
        let tx = self.tx_mut()?;

        let row = sqlx::query(
            "SELECT id, code_system_uri, resource_id, current_version_id
             FROM term_code_systems
             WHERE code_system_uri = $1
             FOR UPDATE",
        )
        .bind(uri)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(code_system_from_row))
    }

    async fn find_code_system_by_resource(
        &mut self,
        resource_id: &str,
    ) -> Result<Option<CodeSystemRecord>> {
        let tx = self.tx_mut()?;

        let row = sqlx::query(
            "SELECT id, code_system_uri, resource_id, current_version_id
             FROM term_code_systems
             WHERE resource_id = $1
             FOR UPDATE",
        )
        .bind(resource_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(code_system_from_row))
    }

    async fn insert_code_system(
        &mut self,
        uri: &str,
        resource_id: &str,
    ) -> Result<CodeSystemRecord> {
        let tx = self.tx_mut()?;

        let pid: i64 = sqlx::query_scalar(
            "INSERT INTO term_code_systems (code_system_uri, resource_id)
             VALUES ($1, $2)
             RETURNING id",
        )
        .bind(uri)
        .bind(resource_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(CodeSystemRecord {
            pid,
            uri: uri.to_string(),
            resource_id: resource_id.to_string(),
            current_version: None,
        })
    }

    async fn rebind_code_system(&mut self, code_system_pid: i64, uri: &str) -> Result<()> {
        let tx = self.tx_mut()?;

        sqlx::query(
            "UPDATE term_code_systems
             SET code_system_uri = $2, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(code_system_pid)
        .bind(uri)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn insert_version(
        &mut self,
        code_system_pid: i64,
        resource_id: &str,
        resource_version_id: i32,
    ) -> Result<i64> {
        let tx = self.tx_mut()?;

        let pid: i64 = sqlx::query_scalar(
            "INSERT INTO term_code_system_versions (code_system_id, resource_id, resource_version_id)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(code_system_pid)
        .bind(resource_id)
        .bind(resource_version_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(pid)
    }

    async fn set_current_version(&mut self, code_system_pid: i64, version_pid: i64) -> Result<()> {
        let tx = self.tx_mut()?;

        sqlx::query(
            "UPDATE term_code_systems
             SET current_version_id = $2, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(code_system_pid)
        .bind(version_pid)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn insert_concept(&mut self, version_pid: i64, concept: &Concept) -> Result<i64> {
        let tx = self.tx_mut()?;

        let pid: i64 = sqlx::query_scalar(
            "INSERT INTO term_concepts (code_system_version_id, code, display, is_abstract)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(version_pid)
        .bind(&concept.code)
        .bind(concept.display.as_deref())
        .bind(concept.is_abstract)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(pid)
    }

    async fn insert_link(
        &mut self,
        version_pid: i64,
        parent_pid: i64,
        child_pid: i64,
    ) -> Result<()> {
        let tx = self.tx_mut()?;

        sqlx::query(
            "INSERT INTO term_concept_links (parent_id, child_id, code_system_version_id)
             VALUES ($1, $2, $3)",
        )
        .bind(parent_pid)
        .bind(child_pid)
        .bind(version_pid)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
