use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::logging::Candidate;
use crate::server::storage_traits::ProviderStore;

/// Turns a logical model name into the ordered list of upstreams to try.
/// Nothing is cached: every call reads the current store state.
#[derive(Clone)]
pub struct ProviderResolver {
    store: Arc<dyn ProviderStore>,
}

impl ProviderResolver {
    pub fn new(store: Arc<dyn ProviderStore>) -> Self {
        Self { store }
    }

    /// An empty result means no route is left for this model.
    pub async fn resolve(&self, model: &str, excluded: &HashSet<i64>) -> Result<Vec<Candidate>> {
        let candidates = self.store.list_candidates(model).await?;
        Ok(order_candidates(candidates, excluded))
    }
}

/// Drop excluded providers, then order by priority (highest first) with the
/// lower provider id winning ties. Weight does not influence the order.
pub fn order_candidates(mut candidates: Vec<Candidate>, excluded: &HashSet<i64>) -> Vec<Candidate> {
    candidates.retain(|c| c.provider.enabled && !excluded.contains(&c.provider.id));
    candidates.sort_by(|a, b| {
        b.provider
            .priority
            .cmp(&a.provider.priority)
            .then_with(|| a.provider.id.cmp(&b.provider.id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{HealthStatus, Provider};
    use crate::test_support;

    fn candidate(id: i64, priority: i64, weight: i64) -> Candidate {
        Candidate {
            provider: Provider {
                id,
                name: format!("p{id}"),
                provider_type: "openai".into(),
                config: "{}".into(),
                enabled: true,
                priority,
                weight,
                health_status: HealthStatus::Unknown,
                last_checked: None,
                latency_ms: None,
                last_status_code: None,
            },
            provider_model: format!("m{id}"),
            mapping_weight: 1,
            model_timeout_secs: None,
        }
    }

    fn ids(c: &[Candidate]) -> Vec<i64> {
        c.iter().map(|c| c.provider.id).collect()
    }

    #[test]
    fn priority_descending_with_id_tie_break() {
        let input = vec![
            candidate(4, 1, 100),
            candidate(3, 10, 1),
            candidate(1, 1, 1),
            candidate(2, 10, 50),
        ];
        let out = order_candidates(input, &HashSet::new());
        assert_eq!(ids(&out), vec![2, 3, 1, 4]);
        for pair in out.windows(2) {
            assert!(pair[0].provider.priority >= pair[1].provider.priority);
        }
    }

    #[test]
    fn ordering_is_stable_across_input_permutations() {
        let a = order_candidates(
            vec![candidate(1, 0, 1), candidate(2, 0, 1), candidate(3, 0, 1)],
            &HashSet::new(),
        );
        let b = order_candidates(
            vec![candidate(3, 0, 1), candidate(1, 0, 1), candidate(2, 0, 1)],
            &HashSet::new(),
        );
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn excluded_ids_never_returned() {
        let all = || vec![candidate(1, 5, 1), candidate(2, 3, 1), candidate(3, 1, 1)];
        let excluded: HashSet<i64> = [1, 3].into_iter().collect();
        assert_eq!(ids(&order_candidates(all(), &excluded)), vec![2]);
        let everything: HashSet<i64> = [1, 2, 3].into_iter().collect();
        assert!(order_candidates(all(), &everything).is_empty());
    }

    #[tokio::test]
    async fn resolves_from_store_and_honours_exclusions() {
        let (_dir, db) = test_support::temp_db().await;
        let low = test_support::add_provider(&db, "low", "openai", "http://low", 1).await;
        let high = test_support::add_provider(&db, "high", "openai", "http://high", 9).await;
        test_support::map_model(&db, "gpt-4o", low, "low-model").await;
        test_support::map_model(&db, "gpt-4o", high, "high-model").await;

        let resolver = ProviderResolver::new(Arc::new(db.clone()));
        let first = resolver.resolve("gpt-4o", &HashSet::new()).await.unwrap();
        assert_eq!(ids(&first), vec![high, low]);
        assert_eq!(first[0].provider_model, "high-model");

        let excluded: HashSet<i64> = [high].into_iter().collect();
        let next = resolver.resolve("gpt-4o", &excluded).await.unwrap();
        assert_eq!(ids(&next), vec![low]);

        assert!(resolver.resolve("missing", &HashSet::new()).await.unwrap().is_empty());
    }
}
