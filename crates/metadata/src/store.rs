//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    ArtifactRepo, DeploymentRepo, DeviceDeploymentRepo, LogRepo, ReleaseRepo, SettingsRepo,
    TenantRepo, UploadIntentRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQL fragment matching the active (non-terminal) device statuses.
const ACTIVE_STATUS_SET: &str = "('pending', 'downloading', 'pause_before_installing', \
     'installing', 'pause_before_committing', 'pause_before_rebooting', 'rebooting')";

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    TenantRepo
    + ArtifactRepo
    + DeploymentRepo
    + DeviceDeploymentRepo
    + LogRepo
    + ReleaseRepo
    + UploadIntentRepo
    + SettingsRepo
    + Send
    + Sync
{
    /// Create the database schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(MetadataError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // serializes writers and keeps the conditional updates atomic.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Internal(format!("I/O error: {e}"))
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl TenantRepo for SqliteStore {
        async fn ensure_tenant(&self, tenant: &TenantRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO tenants (tenant_id, created_at) VALUES (?, ?)
                 ON CONFLICT(tenant_id) DO NOTHING",
            )
            .bind(tenant.tenant_id)
            .bind(tenant.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_tenant(&self, tenant_id: Uuid) -> MetadataResult<Option<TenantRow>> {
            let row = sqlx::query_as::<_, TenantRow>("SELECT * FROM tenants WHERE tenant_id = ?")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl ArtifactRepo for SqliteStore {
        async fn create_artifact(&self, artifact: &ArtifactRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO artifacts (
                    artifact_id, tenant_id, artifact_name, description, size_bytes,
                    checksum, device_types, updates, object_key, modified_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(artifact.artifact_id)
            .bind(artifact.tenant_id)
            .bind(&artifact.artifact_name)
            .bind(&artifact.description)
            .bind(artifact.size_bytes)
            .bind(&artifact.checksum)
            .bind(&artifact.device_types)
            .bind(&artifact.updates)
            .bind(&artifact.object_key)
            .bind(artifact.modified_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!(
                        "artifact {} already exists",
                        artifact.artifact_id
                    ))
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_artifact(
            &self,
            tenant_id: Uuid,
            artifact_id: Uuid,
        ) -> MetadataResult<Option<ArtifactRow>> {
            let row = sqlx::query_as::<_, ArtifactRow>(
                "SELECT * FROM artifacts WHERE tenant_id = ? AND artifact_id = ?",
            )
            .bind(tenant_id)
            .bind(artifact_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn artifact_by_name_and_device_type(
            &self,
            tenant_id: Uuid,
            artifact_name: &str,
            device_type: &str,
        ) -> MetadataResult<Option<ArtifactRow>> {
            // device_types is a JSON array; membership is checked against
            // its elements, not by substring.
            let row = sqlx::query_as::<_, ArtifactRow>(
                r#"
                SELECT a.* FROM artifacts a
                WHERE a.tenant_id = ? AND a.artifact_name = ?
                  AND EXISTS (
                    SELECT 1 FROM json_each(a.device_types)
                    WHERE json_each.value = ?
                  )
                ORDER BY a.modified_at, a.artifact_id
                LIMIT 1
                "#,
            )
            .bind(tenant_id)
            .bind(artifact_name)
            .bind(device_type)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn artifact_name_exists(
            &self,
            tenant_id: Uuid,
            artifact_name: &str,
        ) -> MetadataResult<bool> {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM artifacts WHERE tenant_id = ? AND artifact_name = ?)",
            )
            .bind(tenant_id)
            .bind(artifact_name)
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        }

        async fn list_artifacts(
            &self,
            tenant_id: Uuid,
            name: Option<&str>,
        ) -> MetadataResult<Vec<ArtifactRow>> {
            let rows = match name {
                Some(name) => {
                    sqlx::query_as::<_, ArtifactRow>(
                        "SELECT * FROM artifacts WHERE tenant_id = ? AND artifact_name = ?
                         ORDER BY artifact_name, modified_at, artifact_id",
                    )
                    .bind(tenant_id)
                    .bind(name)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as::<_, ArtifactRow>(
                        "SELECT * FROM artifacts WHERE tenant_id = ?
                         ORDER BY artifact_name, modified_at, artifact_id",
                    )
                    .bind(tenant_id)
                    .fetch_all(&self.pool)
                    .await?
                }
            };
            Ok(rows)
        }

        async fn delete_artifact(&self, tenant_id: Uuid, artifact_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM artifacts WHERE tenant_id = ? AND artifact_id = ?")
                .bind(tenant_id)
                .bind(artifact_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "artifact {artifact_id} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeploymentRepo for SqliteStore {
        async fn create_deployment(
            &self,
            deployment: &DeploymentRow,
            devices: &[DeviceDeploymentRow],
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO deployments (
                    deployment_id, tenant_id, deployment_name, artifact_name, kind,
                    configuration, created_at, finished_at, max_devices
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(deployment.deployment_id)
            .bind(deployment.tenant_id)
            .bind(&deployment.deployment_name)
            .bind(&deployment.artifact_name)
            .bind(&deployment.kind)
            .bind(&deployment.configuration)
            .bind(deployment.created_at)
            .bind(deployment.finished_at)
            .bind(deployment.max_devices)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!(
                        "deployment {} already exists",
                        deployment.deployment_id
                    ))
                } else {
                    e.into()
                }
            })?;

            for device in devices {
                sqlx::query(
                    r#"
                    INSERT INTO device_deployments (
                        id, tenant_id, deployment_id, device_id, status, device_type,
                        artifact_id, substate, log_available, position, created_at, finished_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(device.id)
                .bind(device.tenant_id)
                .bind(device.deployment_id)
                .bind(&device.device_id)
                .bind(&device.status)
                .bind(&device.device_type)
                .bind(device.artifact_id)
                .bind(&device.substate)
                .bind(device.log_available)
                .bind(device.position)
                .bind(device.created_at)
                .bind(device.finished_at)
                .execute(&mut *tx)
                .await?;
            }

            // Seed every statistics bucket so later counter moves are
            // plain conditional updates.
            for status in hangar_core::ALL_STATUSES {
                let count = devices.iter().filter(|d| d.status == status.as_str()).count() as i64;
                sqlx::query(
                    "INSERT INTO deployment_stats (tenant_id, deployment_id, status, device_count)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(deployment.tenant_id)
                .bind(deployment.deployment_id)
                .bind(status.as_str())
                .bind(count)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }

        async fn get_deployment(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
        ) -> MetadataResult<Option<DeploymentRow>> {
            let row = sqlx::query_as::<_, DeploymentRow>(
                "SELECT * FROM deployments WHERE tenant_id = ? AND deployment_id = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_deployments(&self, tenant_id: Uuid) -> MetadataResult<Vec<DeploymentRow>> {
            let rows = sqlx::query_as::<_, DeploymentRow>(
                "SELECT * FROM deployments WHERE tenant_id = ?
                 ORDER BY created_at DESC, deployment_id",
            )
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn deployment_stats(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
        ) -> MetadataResult<Vec<DeploymentStatRow>> {
            let rows = sqlx::query_as::<_, DeploymentStatRow>(
                "SELECT * FROM deployment_stats WHERE tenant_id = ? AND deployment_id = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn finish_deployment(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            finished_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE deployments SET finished_at = COALESCE(finished_at, ?)
                 WHERE tenant_id = ? AND deployment_id = ?",
            )
            .bind(finished_at)
            .bind(tenant_id)
            .bind(deployment_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn artifact_name_in_active_deployment(
            &self,
            tenant_id: Uuid,
            artifact_name: &str,
        ) -> MetadataResult<bool> {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(
                    SELECT 1 FROM deployments
                    WHERE tenant_id = ? AND artifact_name = ? AND finished_at IS NULL
                )",
            )
            .bind(tenant_id)
            .bind(artifact_name)
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        }
    }

    #[async_trait]
    impl DeviceDeploymentRepo for SqliteStore {
        async fn get_device_deployment(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            device_id: &str,
        ) -> MetadataResult<Option<DeviceDeploymentRow>> {
            let row = sqlx::query_as::<_, DeviceDeploymentRow>(
                "SELECT * FROM device_deployments
                 WHERE tenant_id = ? AND deployment_id = ? AND device_id = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn find_oldest_active_for_device(
            &self,
            tenant_id: Uuid,
            device_id: &str,
        ) -> MetadataResult<Option<DeviceDeploymentRow>> {
            let query = format!(
                "SELECT dd.* FROM device_deployments dd
                 JOIN deployments d
                   ON d.tenant_id = dd.tenant_id AND d.deployment_id = dd.deployment_id
                 WHERE dd.tenant_id = ? AND dd.device_id = ?
                   AND dd.status IN {ACTIVE_STATUS_SET}
                   AND d.finished_at IS NULL
                 ORDER BY d.created_at, d.deployment_id
                 LIMIT 1"
            );
            let row = sqlx::query_as::<_, DeviceDeploymentRow>(&query)
                .bind(tenant_id)
                .bind(device_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn transition_device_status(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            device_id: &str,
            expected: &str,
            to: &str,
            substate: Option<&str>,
            finished_at: Option<OffsetDateTime>,
        ) -> MetadataResult<bool> {
            let mut tx = self.pool.begin().await?;

            // Conditional update keyed on the expected prior status. A
            // concurrent writer that changed the status first makes this a
            // no-op; the caller re-reads and re-decides.
            let result = sqlx::query(
                "UPDATE device_deployments
                 SET status = ?, substate = COALESCE(?, substate), finished_at = ?
                 WHERE tenant_id = ? AND deployment_id = ? AND device_id = ? AND status = ?",
            )
            .bind(to)
            .bind(substate)
            .bind(finished_at)
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(device_id)
            .bind(expected)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                tracing::debug!(
                    %deployment_id,
                    device_id,
                    expected,
                    to,
                    "conditional status update lost to a concurrent writer"
                );
                return Ok(false);
            }

            // Move one device between buckets; the pair commits with the
            // status change or not at all.
            sqlx::query(
                "UPDATE deployment_stats SET device_count = MAX(0, device_count - 1)
                 WHERE tenant_id = ? AND deployment_id = ? AND status = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(expected)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO deployment_stats (tenant_id, deployment_id, status, device_count)
                 VALUES (?, ?, ?, 1)
                 ON CONFLICT(tenant_id, deployment_id, status)
                 DO UPDATE SET device_count = device_count + 1",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(to)
            .execute(&mut *tx)
            .await?;

            let active: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM device_deployments
                 WHERE tenant_id = ? AND deployment_id = ? AND status IN {ACTIVE_STATUS_SET}"
            ))
            .bind(tenant_id)
            .bind(deployment_id)
            .fetch_one(&mut *tx)
            .await?;

            if active == 0 {
                let when = finished_at.unwrap_or_else(OffsetDateTime::now_utc);
                sqlx::query(
                    "UPDATE deployments SET finished_at = COALESCE(finished_at, ?)
                     WHERE tenant_id = ? AND deployment_id = ?",
                )
                .bind(when)
                .bind(tenant_id)
                .bind(deployment_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(true)
        }

        async fn assign_artifact(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            device_id: &str,
            artifact_id: Uuid,
            device_type: &str,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE device_deployments SET artifact_id = ?, device_type = ?
                 WHERE tenant_id = ? AND deployment_id = ? AND device_id = ?",
            )
            .bind(artifact_id)
            .bind(device_type)
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "device deployment ({deployment_id}, {device_id}) not found"
                )));
            }
            Ok(())
        }

        async fn abort_device_deployments(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            finished_at: OffsetDateTime,
        ) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            let aborted = sqlx::query(&format!(
                "UPDATE device_deployments SET status = 'aborted', finished_at = ?
                 WHERE tenant_id = ? AND deployment_id = ? AND status IN {ACTIVE_STATUS_SET}"
            ))
            .bind(finished_at)
            .bind(tenant_id)
            .bind(deployment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // Recompute every bucket from the rows rather than replaying
            // per-status deltas.
            sqlx::query(
                "UPDATE deployment_stats SET device_count = (
                     SELECT COUNT(*) FROM device_deployments dd
                     WHERE dd.tenant_id = deployment_stats.tenant_id
                       AND dd.deployment_id = deployment_stats.deployment_id
                       AND dd.status = deployment_stats.status
                 )
                 WHERE tenant_id = ? AND deployment_id = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE deployments SET finished_at = COALESCE(finished_at, ?)
                 WHERE tenant_id = ? AND deployment_id = ?",
            )
            .bind(finished_at)
            .bind(tenant_id)
            .bind(deployment_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(aborted)
        }

        async fn decommission_device(
            &self,
            tenant_id: Uuid,
            device_id: &str,
            finished_at: OffsetDateTime,
        ) -> MetadataResult<Vec<Uuid>> {
            let mut tx = self.pool.begin().await?;

            let affected: Vec<(Uuid,)> = sqlx::query_as(&format!(
                "SELECT deployment_id FROM device_deployments
                 WHERE tenant_id = ? AND device_id = ? AND status IN {ACTIVE_STATUS_SET}"
            ))
            .bind(tenant_id)
            .bind(device_id)
            .fetch_all(&mut *tx)
            .await?;

            sqlx::query(&format!(
                "UPDATE device_deployments SET status = 'decommissioned', finished_at = ?
                 WHERE tenant_id = ? AND device_id = ? AND status IN {ACTIVE_STATUS_SET}"
            ))
            .bind(finished_at)
            .bind(tenant_id)
            .bind(device_id)
            .execute(&mut *tx)
            .await?;

            for (deployment_id,) in &affected {
                sqlx::query(
                    "UPDATE deployment_stats SET device_count = (
                         SELECT COUNT(*) FROM device_deployments dd
                         WHERE dd.tenant_id = deployment_stats.tenant_id
                           AND dd.deployment_id = deployment_stats.deployment_id
                           AND dd.status = deployment_stats.status
                     )
                     WHERE tenant_id = ? AND deployment_id = ?",
                )
                .bind(tenant_id)
                .bind(deployment_id)
                .execute(&mut *tx)
                .await?;

                let active: i64 = sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM device_deployments
                     WHERE tenant_id = ? AND deployment_id = ? AND status IN {ACTIVE_STATUS_SET}"
                ))
                .bind(tenant_id)
                .bind(deployment_id)
                .fetch_one(&mut *tx)
                .await?;

                if active == 0 {
                    sqlx::query(
                        "UPDATE deployments SET finished_at = COALESCE(finished_at, ?)
                         WHERE tenant_id = ? AND deployment_id = ?",
                    )
                    .bind(finished_at)
                    .bind(tenant_id)
                    .bind(deployment_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            tx.commit().await?;
            Ok(affected.into_iter().map(|(id,)| id).collect())
        }

        async fn list_device_deployments(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            offset: i64,
            limit: i64,
        ) -> MetadataResult<Vec<DeviceDeploymentRow>> {
            let rows = sqlx::query_as::<_, DeviceDeploymentRow>(
                "SELECT * FROM device_deployments
                 WHERE tenant_id = ? AND deployment_id = ?
                 ORDER BY position
                 LIMIT ? OFFSET ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_device_deployments(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
        ) -> MetadataResult<i64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM device_deployments
                 WHERE tenant_id = ? AND deployment_id = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(count)
        }

        async fn set_log_available(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            device_id: &str,
        ) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE device_deployments SET log_available = 1
                 WHERE tenant_id = ? AND deployment_id = ? AND device_id = ?",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl LogRepo for SqliteStore {
        async fn append_log_messages(&self, messages: &[LogMessageRow]) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            for message in messages {
                sqlx::query(
                    "INSERT INTO log_messages (
                         tenant_id, deployment_id, device_id, seq, level, message, created_at
                     ) VALUES (
                         ?1, ?2, ?3,
                         COALESCE((SELECT MAX(seq) FROM log_messages
                                   WHERE tenant_id = ?1 AND deployment_id = ?2 AND device_id = ?3), -1) + 1,
                         ?4, ?5, ?6
                     )",
                )
                .bind(message.tenant_id)
                .bind(message.deployment_id)
                .bind(&message.device_id)
                .bind(&message.level)
                .bind(&message.message)
                .bind(message.created_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        }

        async fn get_log_messages(
            &self,
            tenant_id: Uuid,
            deployment_id: Uuid,
            device_id: &str,
        ) -> MetadataResult<Vec<LogMessageRow>> {
            let rows = sqlx::query_as::<_, LogMessageRow>(
                "SELECT * FROM log_messages
                 WHERE tenant_id = ? AND deployment_id = ? AND device_id = ?
                 ORDER BY seq",
            )
            .bind(tenant_id)
            .bind(deployment_id)
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl ReleaseRepo for SqliteStore {
        async fn get_release_notes(
            &self,
            tenant_id: Uuid,
            release_name: &str,
        ) -> MetadataResult<Option<ReleaseNoteRow>> {
            let row = sqlx::query_as::<_, ReleaseNoteRow>(
                "SELECT * FROM release_notes WHERE tenant_id = ? AND release_name = ?",
            )
            .bind(tenant_id)
            .bind(release_name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn put_release_notes(&self, notes: &ReleaseNoteRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO release_notes (tenant_id, release_name, notes, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(tenant_id, release_name)
                 DO UPDATE SET notes = excluded.notes, updated_at = excluded.updated_at",
            )
            .bind(notes.tenant_id)
            .bind(&notes.release_name)
            .bind(&notes.notes)
            .bind(notes.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl UploadIntentRepo for SqliteStore {
        async fn create_intent(&self, intent: &UploadIntentRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO upload_intents (
                     upload_id, tenant_id, status, object_key, metadata, created_at, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(intent.upload_id)
            .bind(intent.tenant_id)
            .bind(&intent.status)
            .bind(&intent.object_key)
            .bind(&intent.metadata)
            .bind(intent.created_at)
            .bind(intent.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!(
                        "upload intent {} already exists",
                        intent.upload_id
                    ))
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_intent(
            &self,
            tenant_id: Uuid,
            upload_id: Uuid,
        ) -> MetadataResult<Option<UploadIntentRow>> {
            let row = sqlx::query_as::<_, UploadIntentRow>(
                "SELECT * FROM upload_intents WHERE tenant_id = ? AND upload_id = ?",
            )
            .bind(tenant_id)
            .bind(upload_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn transition_intent_status(
            &self,
            tenant_id: Uuid,
            upload_id: Uuid,
            expected: &str,
            to: &str,
            metadata: Option<&str>,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE upload_intents
                 SET status = ?, metadata = COALESCE(?, metadata), updated_at = ?
                 WHERE tenant_id = ? AND upload_id = ? AND status = ?",
            )
            .bind(to)
            .bind(metadata)
            .bind(updated_at)
            .bind(tenant_id)
            .bind(upload_id)
            .bind(expected)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl SettingsRepo for SqliteStore {
        async fn get_storage_settings(
            &self,
            tenant_id: Uuid,
        ) -> MetadataResult<Option<StorageSettingsRow>> {
            let row = sqlx::query_as::<_, StorageSettingsRow>(
                "SELECT * FROM storage_settings WHERE tenant_id = ?",
            )
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn put_storage_settings(&self, settings: &StorageSettingsRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO storage_settings (
                     tenant_id, bucket, region, uri, access_key_id,
                     secret_access_key, force_path_style, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                     bucket = excluded.bucket,
                     region = excluded.region,
                     uri = excluded.uri,
                     access_key_id = excluded.access_key_id,
                     secret_access_key = excluded.secret_access_key,
                     force_path_style = excluded.force_path_style,
                     updated_at = excluded.updated_at",
            )
            .bind(settings.tenant_id)
            .bind(&settings.bucket)
            .bind(&settings.region)
            .bind(&settings.uri)
            .bind(&settings.access_key_id)
            .bind(&settings.secret_access_key)
            .bind(settings.force_path_style)
            .bind(settings.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }
}

/// Database schema.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    tenant_id BLOB PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id BLOB PRIMARY KEY,
    tenant_id BLOB NOT NULL,
    artifact_name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    size_bytes INTEGER NOT NULL DEFAULT 0,
    checksum TEXT NOT NULL DEFAULT '',
    device_types TEXT NOT NULL,
    updates TEXT NOT NULL DEFAULT '[]',
    object_key TEXT,
    modified_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_artifacts_tenant_name
    ON artifacts (tenant_id, artifact_name);

CREATE TABLE IF NOT EXISTS deployments (
    deployment_id BLOB NOT NULL,
    tenant_id BLOB NOT NULL,
    deployment_name TEXT NOT NULL,
    artifact_name TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'software',
    configuration BLOB,
    created_at TEXT NOT NULL,
    finished_at TEXT,
    max_devices INTEGER NOT NULL,
    PRIMARY KEY (tenant_id, deployment_id)
);
CREATE INDEX IF NOT EXISTS idx_deployments_tenant_artifact
    ON deployments (tenant_id, artifact_name, finished_at);
CREATE INDEX IF NOT EXISTS idx_deployments_tenant_created
    ON deployments (tenant_id, created_at);

CREATE TABLE IF NOT EXISTS deployment_stats (
    tenant_id BLOB NOT NULL,
    deployment_id BLOB NOT NULL,
    status TEXT NOT NULL,
    device_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, deployment_id, status)
);

CREATE TABLE IF NOT EXISTS device_deployments (
    id BLOB PRIMARY KEY,
    tenant_id BLOB NOT NULL,
    deployment_id BLOB NOT NULL,
    device_id TEXT NOT NULL,
    status TEXT NOT NULL,
    device_type TEXT,
    artifact_id BLOB,
    substate TEXT,
    log_available INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    finished_at TEXT,
    UNIQUE (tenant_id, deployment_id, device_id)
);
CREATE INDEX IF NOT EXISTS idx_device_deployments_tenant_device
    ON device_deployments (tenant_id, device_id, status);

CREATE TABLE IF NOT EXISTS log_messages (
    tenant_id BLOB NOT NULL,
    deployment_id BLOB NOT NULL,
    device_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (tenant_id, deployment_id, device_id, seq)
);

CREATE TABLE IF NOT EXISTS release_notes (
    tenant_id BLOB NOT NULL,
    release_name TEXT NOT NULL,
    notes TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (tenant_id, release_name)
);

CREATE TABLE IF NOT EXISTS upload_intents (
    upload_id BLOB PRIMARY KEY,
    tenant_id BLOB NOT NULL,
    status TEXT NOT NULL,
    object_key TEXT NOT NULL,
    metadata TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS storage_settings (
    tenant_id BLOB PRIMARY KEY,
    bucket TEXT NOT NULL,
    region TEXT NOT NULL,
    uri TEXT,
    access_key_id TEXT,
    secret_access_key TEXT,
    force_path_style INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;
