use rusqlite::{Connection, Result, Row, params};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::time::{column_datetime, to_iso8601_utc_string};
use super::types::{RequestLog, TokenUsage};

#[derive(Clone)]
pub struct DatabaseLogger {
    pub(super) connection: Arc<Mutex<Connection>>,
}

const REQUEST_LOG_COLUMNS: &str = "id, request_id, attempt, timestamp, proxy_key, model, provider_model,
     provider, provider_id, request_url, request_body, response_body, status_code, is_success,
     latency_ms, error_message, prompt_tokens, completion_tokens, total_tokens";

impl DatabaseLogger {
    pub async fn new(database_path: &str) -> Result<Self> {
        // 确保数据库文件的目录存在
        if let Some(parent) = std::path::Path::new(database_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                ));
            }
            tracing::info!("Created database directory: {}", parent.display());
        }

        let conn = Connection::open(database_path)?;
        Self::init_schema(&conn)?;
        tracing::info!("Database initialized at: {}", database_path);

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS providers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL DEFAULT 'openai',
                config TEXT NOT NULL DEFAULT '{}',
                enabled INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                weight INTEGER NOT NULL DEFAULT 1,
                health_status TEXT NOT NULL DEFAULT 'unknown',
                last_checked TEXT,
                latency_ms INTEGER,
                last_status_code INTEGER,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                remark TEXT,
                max_retry INTEGER NOT NULL DEFAULT 3,
                timeout INTEGER,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS model_provider_mappings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_id INTEGER NOT NULL,
                provider_id INTEGER NOT NULL,
                provider_model TEXT NOT NULL,
                tool_call INTEGER NOT NULL DEFAULT 0,
                structured_output INTEGER NOT NULL DEFAULT 0,
                image INTEGER NOT NULL DEFAULT 0,
                weight INTEGER NOT NULL DEFAULT 1,
                enabled INTEGER NOT NULL DEFAULT 1,
                UNIQUE (model_id, provider_id, provider_model),
                FOREIGN KEY (model_id) REFERENCES models(id) ON DELETE CASCADE,
                FOREIGN KEY (provider_id) REFERENCES providers(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS proxy_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                enabled INTEGER NOT NULL DEFAULT 1,
                allowed_groups TEXT,
                rpm_limit INTEGER,
                tpm_limit INTEGER,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS request_logs (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                attempt INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                proxy_key TEXT,
                model TEXT NOT NULL,
                provider_model TEXT,
                provider TEXT NOT NULL,
                provider_id INTEGER NOT NULL,
                request_url TEXT,
                request_body TEXT,
                response_body TEXT,
                status_code INTEGER,
                is_success INTEGER NOT NULL,
                latency_ms INTEGER NOT NULL,
                error_message TEXT,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                usage_recorded INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_request_logs_request_id ON request_logs(request_id);
            CREATE INDEX IF NOT EXISTS idx_request_logs_provider_model
                ON request_logs(provider, provider_model, timestamp);",
        )
    }

    pub async fn log_request(&self, log: &RequestLog) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            &format!(
                "INSERT INTO request_logs ({REQUEST_LOG_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
            ),
            params![
                &log.id,
                &log.request_id,
                log.attempt,
                to_iso8601_utc_string(&log.timestamp),
                &log.proxy_key,
                &log.model,
                &log.provider_model,
                &log.provider,
                log.provider_id,
                &log.request_url,
                &log.request_body,
                &log.response_body,
                log.status_code,
                log.is_success,
                log.latency_ms,
                &log.error_message,
                log.usage.prompt_tokens,
                log.usage.completion_tokens,
                log.usage.total_tokens,
            ],
        )?;
        Ok(())
    }

    /// 回填 token 用量与响应体；每行只允许回填一次
    pub async fn update_log_usage(
        &self,
        id: &str,
        usage: &TokenUsage,
        response_body: Option<&str>,
    ) -> Result<bool> {
        let conn = self.connection.lock().await;
        let affected = conn.execute(
            "UPDATE request_logs
             SET prompt_tokens = ?2, completion_tokens = ?3, total_tokens = ?4,
                 response_body = COALESCE(?5, response_body), usage_recorded = 1
             WHERE id = ?1 AND usage_recorded = 0",
            params![
                id,
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
                response_body,
            ],
        )?;
        Ok(affected > 0)
    }

    pub async fn get_logs_for_request(&self, request_id: &str) -> Result<Vec<RequestLog>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_LOG_COLUMNS} FROM request_logs WHERE request_id = ?1 ORDER BY attempt"
        ))?;
        let rows = stmt.query_map([request_id], request_log_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub async fn get_log(&self, id: &str) -> Result<Option<RequestLog>> {
        use rusqlite::OptionalExtension;
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_LOG_COLUMNS} FROM request_logs WHERE id = ?1"
        ))?;
        stmt.query_row([id], request_log_from_row).optional()
    }

    pub async fn recent_attempts(
        &self,
        provider: &str,
        provider_model: &str,
        limit: i64,
    ) -> Result<Vec<RequestLog>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_LOG_COLUMNS} FROM request_logs
             WHERE provider = ?1 AND provider_model = ?2
             ORDER BY timestamp DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![provider, provider_model, limit], request_log_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn request_log_from_row(row: &Row<'_>) -> Result<RequestLog> {
    let timestamp = column_datetime(3, Some(row.get::<_, String>(3)?))?.unwrap_or_default();
    let status_code: Option<i64> = row.get(12)?;
    Ok(RequestLog {
        id: row.get(0)?,
        request_id: row.get(1)?,
        attempt: row.get(2)?,
        timestamp,
        proxy_key: row.get(4)?,
        model: row.get(5)?,
        provider_model: row.get(6)?,
        provider: row.get(7)?,
        provider_id: row.get(8)?,
        request_url: row.get(9)?,
        request_body: row.get(10)?,
        response_body: row.get(11)?,
        status_code: status_code.and_then(|c| u16::try_from(c).ok()),
        is_success: row.get(13)?,
        latency_ms: row.get(14)?,
        error_message: row.get(15)?,
        usage: TokenUsage {
            prompt_tokens: row.get(16)?,
            completion_tokens: row.get(17)?,
            total_tokens: row.get(18)?,
        },
    })
}
