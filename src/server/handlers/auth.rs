use axum::http::HeaderMap;

use crate::error::GatewayError;
use crate::logging::ProxyKey;
use crate::server::AppState;
use crate::server::storage_traits::ProxyKeyStore;
use crate::server::util::bearer_token;

/// Check the caller's proxy key: exact match against an enabled record.
pub async fn validate_proxy_key(
    store: &dyn ProxyKeyStore,
    headers: &HeaderMap,
) -> Result<ProxyKey, GatewayError> {
    let Some(token) = bearer_token(headers) else {
        return Err(GatewayError::Unauthorized("Missing API key".into()));
    };
    match store.find_proxy_key(&token).await? {
        Some(key) => Ok(key),
        None => Err(GatewayError::Unauthorized("Invalid API key".into())),
    }
}

// 管理接口：仅接受本次启动的管理员身份令牌
pub fn require_admin(headers: &HeaderMap, app_state: &AppState) -> Result<(), GatewayError> {
    match bearer_token(headers) {
        Some(token) if token == app_state.admin_identity_token => Ok(()),
        _ => Err(GatewayError::Unauthorized("admin token required".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::http::HeaderValue;

    fn with_bearer(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        h
    }

    #[tokio::test]
    async fn proxy_key_must_exist_and_be_enabled() {
        let (_dir, db) = test_support::temp_db().await;
        db.insert_proxy_key("sk-live").await.unwrap();
        db.insert_proxy_key("sk-off").await.unwrap();
        db.set_proxy_key_enabled("sk-off", false).await.unwrap();

        let key = validate_proxy_key(&db, &with_bearer("sk-live")).await.unwrap();
        assert_eq!(key.key, "sk-live");
        assert!(matches!(
            validate_proxy_key(&db, &with_bearer("sk-off")).await,
            Err(GatewayError::Unauthorized(_))
        ));
        assert!(matches!(
            validate_proxy_key(&db, &with_bearer("sk-unknown")).await,
            Err(GatewayError::Unauthorized(_))
        ));
        assert!(matches!(
            validate_proxy_key(&db, &HeaderMap::new()).await,
            Err(GatewayError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn admin_gate_compares_identity_token() {
        let (_dir, db) = test_support::temp_db().await;
        let state = test_support::test_state(&db).await;
        assert!(require_admin(&with_bearer("admin-test-token"), &state).is_ok());
        assert!(require_admin(&with_bearer("sk-proxy-test-0001"), &state).is_err());
        assert!(require_admin(&HeaderMap::new(), &state).is_err());
    }
}
