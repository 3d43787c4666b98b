//! Performance benchmarks for matching and filter evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use courier::filters::{evaluate, Filter, FilterOperator};
use courier::{
    ChannelKind, Event, EventMetadata, Recipients, SubscriptionConfig, SubscriptionRegistry,
};
use serde_json::json;

fn subscription(event_type: &str, amount_threshold: i64) -> SubscriptionConfig {
    SubscriptionConfig {
        name: format!("{event_type}-{amount_threshold}"),
        event_types: vec![event_type.to_string()],
        channels: vec![ChannelKind::Telegram],
        recipients: Recipients {
            telegram_chat_ids: vec!["1".into()],
            ..Default::default()
        },
        filters: vec![Filter::new(
            "data.amount",
            FilterOperator::Gt,
            json!(amount_threshold),
        )],
        ..Default::default()
    }
}

/// Benchmark matching with varying registry sizes
fn bench_match_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_event");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("subscriptions", size), &size, |b, &size| {
            let registry = SubscriptionRegistry::new();
            for i in 0..size {
                // A tenth of the registry listens to the published type.
                let event_type = if i % 10 == 0 { "order.created" } else { "lead.created" };
                registry.register(subscription(event_type, (i % 50) as i64)).unwrap();
            }
            let event = Event::new(
                "order.created",
                json!({"data": {"amount": 100}}),
                EventMetadata::default(),
            );

            b.iter(|| {
                black_box(registry.match_event(&event));
            });
        });
    }

    group.finish();
}

/// Benchmark single-filter evaluation over nested payloads
fn bench_filter_eval(c: &mut Criterion) {
    let payload = json!({
        "data": {
            "current": {"email": "buyer@example.com", "amount": 120},
            "previous": {"email": "buyer@example.com", "amount": 80},
            "tags": ["vip", "eu", "returning"]
        }
    });

    let filters = vec![
        ("gt", Filter::new("data.current.amount", FilterOperator::Gt, json!(100))),
        ("contains", Filter::new("data.current.email", FilterOperator::Contains, json!("@example."))),
        ("in", Filter::new("data.tags.0", FilterOperator::In, json!(["vip", "staff"]))),
        ("missing_ne", Filter::new("data.current.gone", FilterOperator::Ne, json!("x"))),
    ];

    let mut group = c.benchmark_group("filter_eval");
    for (name, filter) in filters {
        group.bench_function(name, |b| {
            b.iter(|| black_box(evaluate(&filter, &payload)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_match_event, bench_filter_eval);
criterion_main!(benches);
