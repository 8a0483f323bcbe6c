use std::collections::HashMap;

use super::database::DatabaseLogger;
use super::types::{NewMapping, NewModel, NewProvider};
use crate::config::{ProviderSeed, Settings};
use crate::error::Result;
use crate::providers::{ProviderConfig, RetryPolicy};

fn provider_config_blob(seed: &ProviderSeed) -> Result<String> {
    ProviderConfig {
        api_key: seed.api_key.clone(),
        base_url: Some(seed.base_url.clone()),
        chat_path: seed.chat_path.clone(),
        timeout: seed.timeout,
        retry_policy: seed.retry_status_codes.clone().map(|codes| RetryPolicy {
            status_codes: codes,
        }),
    }
    .to_json()
}

impl DatabaseLogger {
    /// 将配置文件中的供应商、模型、映射与代理密钥写入数据库
    pub async fn apply_seed(&self, settings: &Settings) -> Result<()> {
        let mut provider_ids = HashMap::new();
        for (name, seed) in &settings.providers {
            let id = self
                .upsert_provider(&NewProvider {
                    name: name.clone(),
                    provider_type: seed.provider_type.clone(),
                    config: provider_config_blob(seed)?,
                    enabled: seed.enabled,
                    priority: seed.priority,
                    weight: seed.weight,
                })
                .await?;
            provider_ids.insert(name.as_str(), id);
        }

        for (name, seed) in &settings.models {
            let model_id = self
                .upsert_model(&NewModel {
                    name: name.clone(),
                    remark: None,
                    max_retry: seed.max_retry,
                    timeout_secs: seed.timeout,
                    enabled: seed.enabled,
                })
                .await?;

            for m in &seed.mappings {
                let Some(&provider_id) = provider_ids.get(m.provider.as_str()) else {
                    tracing::warn!(
                        model = %name,
                        provider = %m.provider,
                        "Skipping mapping to a provider that is not configured"
                    );
                    continue;
                };
                self.upsert_mapping(&NewMapping {
                    model_id,
                    provider_id,
                    provider_model: m.provider_model.clone(),
                    weight: m.weight,
                    enabled: m.enabled,
                    tool_call: m.tool_call,
                    structured_output: m.structured_output,
                    image: m.image,
                })
                .await?;
            }
        }

        for key in &settings.proxy_keys {
            let key = key.trim();
            if !key.is_empty() {
                self.insert_proxy_key(key).await?;
            }
        }

        tracing::info!(
            providers = settings.providers.len(),
            models = settings.models.len(),
            proxy_keys = settings.proxy_keys.len(),
            "Applied configuration seed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn seed_creates_routable_models() {
        let dir = tempdir().unwrap();
        let db = DatabaseLogger::new(dir.path().join("gw.db").to_str().unwrap())
            .await
            .unwrap();
        let settings = Settings::from_toml_str(
            r#"
            proxy_keys = ["sk-proxy", "  "]

            [providers.main]
            base_url = "http://127.0.0.1:1"
            api_key = "sk-up"
            priority = 5
            retry_status_codes = [503]

            [models.gpt-4o]
            mappings = [
              { provider = "main", provider_model = "gpt-4o-mini" },
              { provider = "ghost", provider_model = "nope" },
            ]
            "#,
        )
        .unwrap();

        db.apply_seed(&settings).await.unwrap();
        // 再次写入保持幂等
        db.apply_seed(&settings).await.unwrap();

        let candidates = db.list_candidates("gpt-4o").await.unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.provider.name, "main");
        assert_eq!(c.provider_model, "gpt-4o-mini");

        let cfg = ProviderConfig::parse(&c.provider.config).unwrap();
        assert_eq!(cfg.api_key(), "sk-up");
        assert_eq!(cfg.base_url(), Some("http://127.0.0.1:1"));
        assert!(cfg.is_retriable_status(503));
        assert!(!cfg.is_retriable_status(429));

        assert!(db.find_proxy_key("sk-proxy").await.unwrap().is_some());
    }
}
