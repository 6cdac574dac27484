use lectern_connector::{Metadata, MockConnector, Registry};
use lectern_resolve::{PoolKind, Resolution, Resolver, ResolverOptions};
use std::sync::Arc;
use std::time::Duration;

fn slow_connector(key: &str, delay: Duration) -> Arc<MockConnector> {
    Arc::new(
        MockConnector::new(key)
            .with_default(Metadata::default().with_cover("https://img.example/cover.jpg"))
            .with_delay(delay),
    )
}

fn resolver(connectors: &[Arc<MockConnector>], options: ResolverOptions) -> Resolver {
    let mut registry = Registry::new();
    for connector in connectors {
        registry.register(Arc::clone(connector) as _);
    }
    Resolver::new(Arc::new(registry), options)
}

#[tokio::test(start_paused = true)]
async fn burst_of_distinct_requests_respects_pool_capacity() {
    let connector = slow_connector("site", Duration::from_millis(500));
    let resolver = resolver(
        &[Arc::clone(&connector)],
        ResolverOptions { default_capacity: 3, slow_capacity: 1, ..Default::default() },
    );

    for n in 0..20 {
        let resolution = resolver.resolve_or_queue_cover("site", &format!("https://site.example/t/{n}"), None, "");
        assert!(resolution.pending);
    }
    assert_eq!(resolver.in_flight(), 20);
    resolver.wait_idle().await;

    assert_eq!(connector.calls(), 20);
    assert_eq!(connector.max_concurrent(), 3);
    assert_eq!(resolver.in_flight(), 0);
    assert_eq!(resolver.available(PoolKind::Default), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_sources_cannot_starve_the_default_pool() {
    let slow = slow_connector("slow", Duration::from_secs(10));
    let fast = slow_connector("fast", Duration::from_millis(10));
    let resolver = resolver(
        &[Arc::clone(&slow), Arc::clone(&fast)],
        ResolverOptions {
            default_capacity: 4,
            slow_capacity: 2,
            slow_sources: vec!["slow".to_string()],
            fetch_timeout: Duration::from_secs(60),
            ..Default::default()
        },
    );

    for n in 0..10 {
        resolver.resolve_or_queue_cover("slow", &format!("https://slow.example/t/{n}"), None, "");
        resolver.resolve_or_queue_cover("fast", &format!("https://fast.example/t/{n}"), None, "");
    }

    // Long before the slow site answers, every fast request is done.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fast.calls(), 10);
    let cached = resolver.resolve_or_queue_cover("fast", "https://fast.example/t/9", None, "");
    assert_eq!(cached, Resolution::ready("https://img.example/cover.jpg"));

    resolver.wait_idle().await;
    assert_eq!(slow.max_concurrent(), 2);
    assert!(fast.max_concurrent() <= 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_fetch() {
    let connector = slow_connector("site", Duration::from_millis(100));
    let resolver = resolver(&[Arc::clone(&connector)], ResolverOptions::default());

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve_or_queue_cover("site", "https://site.example/t/1", None, "") })
        })
        .collect();
    for caller in callers {
        caller.await.unwrap();
    }
    resolver.wait_idle().await;

    assert_eq!(connector.calls(), 1);
    assert_eq!(
        resolver.resolve_or_queue_cover("site", "https://site.example/t/1", None, ""),
        Resolution::ready("https://img.example/cover.jpg")
    );
}

#[tokio::test(start_paused = true)]
async fn navigating_away_abandons_queued_fetches() {
    let connector = slow_connector("site", Duration::from_secs(1));
    let resolver = resolver(
        &[Arc::clone(&connector)],
        ResolverOptions { default_capacity: 1, ..Default::default() },
    );

    resolver.set_active_page("page-1");
    for n in 0..5 {
        resolver.resolve_or_queue_cover("site", &format!("https://site.example/t/{n}"), None, "page-1");
    }
    // Let the first fetch take the only token, then leave the page.
    tokio::task::yield_now().await;
    resolver.set_active_page("page-2");
    resolver.wait_idle().await;

    // Only the fetch that had already started ran.
    assert_eq!(connector.calls(), 1);
    assert_eq!(resolver.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_waiting_fetches() {
    let connector = slow_connector("site", Duration::from_secs(1));
    let resolver = resolver(
        &[Arc::clone(&connector)],
        ResolverOptions { default_capacity: 1, ..Default::default() },
    );
    for n in 0..5 {
        resolver.resolve_or_queue_cover("site", &format!("https://site.example/t/{n}"), None, "");
    }
    tokio::task::yield_now().await;
    resolver.shutdown().await;

    assert_eq!(connector.calls(), 1);
    assert_eq!(resolver.in_flight(), 0);
}
