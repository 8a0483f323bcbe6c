use std::collections::HashSet;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use fusion_gateway::logging::{Candidate, HealthStatus, Provider};
use fusion_gateway::providers::build_request_body;
use fusion_gateway::routing::order_candidates;
use fusion_gateway::server::usage::extract_usage;

fn sse_body(events: usize) -> Vec<u8> {
    let mut out = String::new();
    for i in 0..events {
        out.push_str(&format!(
            "data: {{\"id\":\"c\",\"choices\":[{{\"delta\":{{\"content\":\"token {i}\"}}}}]}}\n\n"
        ));
    }
    out.push_str("data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":800,\"total_tokens\":812}}\n\n");
    out.push_str("data: [DONE]\n\n");
    out.into_bytes()
}

fn candidates(n: i64) -> Vec<Candidate> {
    (0..n)
        .map(|id| Candidate {
            provider: Provider {
                id,
                name: format!("p{id}"),
                provider_type: "openai".into(),
                config: "{}".into(),
                enabled: true,
                priority: id % 7,
                weight: 1,
                health_status: HealthStatus::Unknown,
                last_checked: None,
                latency_ms: None,
                last_status_code: None,
            },
            provider_model: format!("m{id}"),
            mapping_weight: 1,
            model_timeout_secs: None,
        })
        .collect()
}

fn bench_usage(c: &mut Criterion) {
    let mut group = c.benchmark_group("usage");
    for events in [10usize, 1_000] {
        let body = sse_body(events);
        group.bench_with_input(BenchmarkId::new("stream", events), &body, |b, body| {
            b.iter(|| black_box(extract_usage(black_box(body), true)))
        });
    }
    let plain = br#"{"id":"x","choices":[{"message":{"content":"hi"}}],"usage":{"prompt_tokens":3,"completion_tokens":5,"total_tokens":8}}"#;
    group.bench_function("json", |b| {
        b.iter(|| black_box(extract_usage(black_box(plain), false)))
    });
    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let all = candidates(64);
    let excluded: HashSet<i64> = (0..8).collect();
    c.bench_function("order_candidates/64", |b| {
        b.iter(|| black_box(order_candidates(all.clone(), &excluded)))
    });

    let body = serde_json::json!({
        "model": "gpt-4o",
        "stream": true,
        "user": "[undefined]",
        "messages": (0..32).map(|i| serde_json::json!({"role": "user", "content": format!("message {i}")})).collect::<Vec<_>>(),
    });
    let map = body.as_object().cloned().unwrap_or_default();
    c.bench_function("build_request_body", |b| {
        b.iter(|| black_box(build_request_body(black_box(&map), "gpt-4o-2024-08-06")))
    });
}

criterion_group!(benches, bench_usage, bench_routing);
criterion_main!(benches);
