use crate::error::GatewayError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 将 UTC 时间转换为 ISO-8601 / RFC3339（UTC, `Z`），写库统一使用该格式
pub fn to_iso8601_utc_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 解析时间字符串为 UTC：
/// - 优先 RFC3339 / ISO-8601（带时区偏移或 `Z`）
/// - 兼容 SQLite `CURRENT_TIMESTAMP` 的 `YYYY-MM-DD HH:mm:ss(.f)?`（按 UTC 解释）
pub fn parse_datetime_string(s: &str) -> crate::error::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let trimmed = s.strip_suffix(" UTC").unwrap_or(s);
    for fmt in [DATETIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(GatewayError::TimeParse(format!("unrecognized timestamp: {s}")))
}

// rusqlite 行映射内使用：解析失败时按列转换错误上报
pub(crate) fn column_datetime(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(s) => parse_datetime_string(&s).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        }),
    }
}
