use rusqlite::{OptionalExtension, Result};

use super::database::DatabaseLogger;
use super::types::ProxyKey;

impl DatabaseLogger {
    pub async fn insert_proxy_key(&self, key: &str) -> Result<bool> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "INSERT OR IGNORE INTO proxy_keys (key, enabled) VALUES (?1, 1)",
            [key],
        )?;
        Ok(n > 0)
    }

    pub async fn set_proxy_key_enabled(&self, key: &str, enabled: bool) -> Result<bool> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "UPDATE proxy_keys SET enabled = ?2 WHERE key = ?1",
            (key, enabled),
        )?;
        Ok(n > 0)
    }

    /// 查找启用状态的代理密钥；禁用或不存在都返回 None
    pub async fn find_proxy_key(&self, key: &str) -> Result<Option<ProxyKey>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, key, enabled, allowed_groups, rpm_limit, tpm_limit
             FROM proxy_keys WHERE key = ?1 AND enabled = 1 LIMIT 1",
        )?;
        stmt.query_row([key], |row| {
            Ok(ProxyKey {
                id: row.get(0)?,
                key: row.get(1)?,
                enabled: row.get::<_, i64>(2)? != 0,
                allowed_groups: row.get(3)?,
                rpm_limit: row.get(4)?,
                tpm_limit: row.get(5)?,
            })
        })
        .optional()
    }
}
