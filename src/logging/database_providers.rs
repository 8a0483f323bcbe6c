use rusqlite::{OptionalExtension, Result, Row};

use super::database::DatabaseLogger;
use super::time::{column_datetime, parse_datetime_string, to_iso8601_utc_string};
use super::types::{
    Candidate, HealthStatus, HealthUpdate, Model, ModelProviderMapping, NewMapping, NewModel,
    NewProvider, Provider,
};

const PROVIDER_COLUMNS: &str = "p.id, p.name, p.type, p.config, p.enabled, p.priority, p.weight,
     p.health_status, p.last_checked, p.latency_ms, p.last_status_code";

fn provider_from_row(row: &Row<'_>) -> Result<Provider> {
    let health: Option<String> = row.get(7)?;
    let last_code: Option<i64> = row.get(10)?;
    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        provider_type: row.get(2)?,
        config: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        priority: row.get(5)?,
        weight: row.get(6)?,
        health_status: HealthStatus::from_db_value(health.as_deref()),
        last_checked: column_datetime(8, row.get(8)?)?,
        latency_ms: row.get(9)?,
        last_status_code: last_code.and_then(|c| u16::try_from(c).ok()),
    })
}

fn model_from_row(row: &Row<'_>) -> Result<Model> {
    let created: String = row.get(6)?;
    let timeout: Option<i64> = row.get(4)?;
    Ok(Model {
        id: row.get(0)?,
        name: row.get(1)?,
        remark: row.get(2)?,
        max_retry: row.get(3)?,
        timeout_secs: timeout.and_then(|t| u64::try_from(t).ok()),
        enabled: row.get::<_, i64>(5)? != 0,
        created_at: parse_datetime_string(&created).unwrap_or_default(),
    })
}

fn mapping_from_row(row: &Row<'_>) -> Result<ModelProviderMapping> {
    Ok(ModelProviderMapping {
        id: row.get(0)?,
        model_id: row.get(1)?,
        provider_id: row.get(2)?,
        provider_model: row.get(3)?,
        weight: row.get(4)?,
        enabled: row.get::<_, i64>(5)? != 0,
        tool_call: row.get::<_, i64>(6)? != 0,
        structured_output: row.get::<_, i64>(7)? != 0,
        image: row.get::<_, i64>(8)? != 0,
    })
}

impl DatabaseLogger {
    // ---- providers ----

    /// 按名称 upsert；健康字段保持不变
    pub async fn upsert_provider(&self, provider: &NewProvider) -> Result<i64> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO providers (name, type, config, enabled, priority, weight)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET type = excluded.type,
                                         config = excluded.config,
                                         enabled = excluded.enabled,
                                         priority = excluded.priority,
                                         weight = excluded.weight",
            (
                &provider.name,
                &provider.provider_type,
                &provider.config,
                provider.enabled,
                provider.priority,
                provider.weight,
            ),
        )?;
        conn.query_row(
            "SELECT id FROM providers WHERE name = ?1",
            [&provider.name],
            |row| row.get(0),
        )
    }

    pub async fn get_provider(&self, id: i64) -> Result<Option<Provider>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM providers p WHERE p.id = ?1 LIMIT 1"
        ))?;
        stmt.query_row([id], provider_from_row).optional()
    }

    pub async fn list_providers(&self) -> Result<Vec<Provider>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM providers p ORDER BY p.id"
        ))?;
        let rows = stmt.query_map([], provider_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub async fn set_provider_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "UPDATE providers SET enabled = ?2 WHERE id = ?1",
            (id, enabled),
        )?;
        Ok(n > 0)
    }

    pub async fn update_provider_health(&self, id: i64, update: &HealthUpdate) -> Result<bool> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "UPDATE providers
             SET health_status = ?2, latency_ms = ?3, last_status_code = ?4, last_checked = ?5
             WHERE id = ?1",
            (
                id,
                update.status.as_db_value(),
                update.latency_ms,
                update.last_status_code,
                to_iso8601_utc_string(&update.checked_at),
            ),
        )?;
        Ok(n > 0)
    }

    // ---- models ----

    pub async fn upsert_model(&self, model: &NewModel) -> Result<i64> {
        let conn = self.connection.lock().await;
        let timeout = model.timeout_secs.and_then(|t| i64::try_from(t).ok());
        conn.execute(
            "INSERT INTO models (name, remark, max_retry, timeout, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET remark = excluded.remark,
                                         max_retry = excluded.max_retry,
                                         timeout = excluded.timeout,
                                         enabled = excluded.enabled",
            (&model.name, &model.remark, model.max_retry, timeout, model.enabled),
        )?;
        conn.query_row("SELECT id FROM models WHERE name = ?1", [&model.name], |row| {
            row.get(0)
        })
    }

    pub async fn find_model(&self, name: &str) -> Result<Option<Model>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, remark, max_retry, timeout, enabled, created_at
             FROM models WHERE name = ?1 LIMIT 1",
        )?;
        stmt.query_row([name], model_from_row).optional()
    }

    pub async fn list_models(&self, enabled_only: bool) -> Result<Vec<Model>> {
        let conn = self.connection.lock().await;
        let sql = if enabled_only {
            "SELECT id, name, remark, max_retry, timeout, enabled, created_at
             FROM models WHERE enabled = 1 ORDER BY name"
        } else {
            "SELECT id, name, remark, max_retry, timeout, enabled, created_at
             FROM models ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], model_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // ---- mappings ----

    pub async fn upsert_mapping(&self, mapping: &NewMapping) -> Result<i64> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO model_provider_mappings
                 (model_id, provider_id, provider_model, weight, enabled, tool_call, structured_output, image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(model_id, provider_id, provider_model) DO UPDATE SET
                 weight = excluded.weight,
                 enabled = excluded.enabled,
                 tool_call = excluded.tool_call,
                 structured_output = excluded.structured_output,
                 image = excluded.image",
            (
                mapping.model_id,
                mapping.provider_id,
                &mapping.provider_model,
                mapping.weight,
                mapping.enabled,
                mapping.tool_call,
                mapping.structured_output,
                mapping.image,
            ),
        )?;
        conn.query_row(
            "SELECT id FROM model_provider_mappings
             WHERE model_id = ?1 AND provider_id = ?2 AND provider_model = ?3",
            (mapping.model_id, mapping.provider_id, &mapping.provider_model),
            |row| row.get(0),
        )
    }

    /// 某逻辑模型当前可用的 (供应商, 上游模型) 组合。
    /// 模型、映射、供应商三者都必须启用；未知模型返回空列表。
    pub async fn list_candidates(&self, model: &str) -> Result<Vec<Candidate>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROVIDER_COLUMNS}, mpm.provider_model, mpm.weight, m.timeout
             FROM models m
             JOIN model_provider_mappings mpm ON mpm.model_id = m.id
             JOIN providers p ON p.id = mpm.provider_id
             WHERE m.name = ?1 AND m.enabled = 1 AND mpm.enabled = 1 AND p.enabled = 1
             ORDER BY p.priority DESC, p.id ASC, mpm.id ASC"
        ))?;
        let rows = stmt.query_map([model], |row| {
            let provider = provider_from_row(row)?;
            let timeout: Option<i64> = row.get(13)?;
            Ok(Candidate {
                provider,
                provider_model: row.get(11)?,
                mapping_weight: row.get(12)?,
                model_timeout_secs: timeout.and_then(|t| u64::try_from(t).ok()),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Mapping plus the name of the provider it points at.
    pub async fn get_mapping_with_provider(
        &self,
        id: i64,
    ) -> Result<Option<(ModelProviderMapping, String)>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(
            "SELECT mpm.id, mpm.model_id, mpm.provider_id, mpm.provider_model, mpm.weight, mpm.enabled,
                    mpm.tool_call, mpm.structured_output, mpm.image, p.name
             FROM model_provider_mappings mpm
             JOIN providers p ON p.id = mpm.provider_id
             WHERE mpm.id = ?1",
        )?;
        stmt.query_row([id], |row| {
            let mapping = mapping_from_row(row)?;
            let provider: String = row.get(9)?;
            Ok((mapping, provider))
        })
        .optional()
    }
}
