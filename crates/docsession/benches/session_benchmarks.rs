//! Session hot-path benchmarks.
//!
//! The host sends active-document notifications on every window switch, and
//! each one may tear down and rebuild a proxy with its full event table. These
//! benchmarks cover that churn and the per-event dispatch cost.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use docsession::config::SessionConfig;
use docsession::session::ApplicationSession;
use docsession_core::testing::FakeHost;
use docsession_core::{DocumentKind, NativeDocument, NativeEvent};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn session(runtime: &Runtime) -> (std::sync::Arc<FakeHost>, ApplicationSession) {
    let host = FakeHost::new();
    let session = ApplicationSession::new(
        host.clone(),
        SessionConfig::default(),
        runtime.handle().clone(),
    );
    (host, session)
}

/// Switching between documents replaces the proxy each time.
fn bench_active_change_churn(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("active_change");

    for kind in [DocumentKind::Part, DocumentKind::Assembly, DocumentKind::Drawing] {
        let (host, session) = session(&runtime);
        let a = host.add_document(kind, Some("C:/bench/a"));
        let b = host.add_background_document(kind, Some("C:/bench/b"));

        group.bench_with_input(BenchmarkId::new("switch", kind), &kind, |bench, _| {
            let mut toggle = false;
            bench.iter(|| {
                toggle = !toggle;
                host.activate(if toggle { a.handle() } else { b.handle() });
                black_box(session.notify_active_changed());
            });
        });

        session.shutdown();
    }

    group.finish();
}

/// Same handle reported again: reload in place.
fn bench_reload_in_place(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (host, session) = session(&runtime);
    host.add_document(DocumentKind::Drawing, Some("C:/bench/d.slddrw"));
    session.notify_active_changed();

    c.bench_function("reload_in_place", |bench| {
        bench.iter(|| black_box(session.notify_active_changed()));
    });

    session.shutdown();
}

/// Native event to outbound document event.
fn bench_native_event_dispatch(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (host, session) = session(&runtime);
    let native = host.add_document(DocumentKind::Part, Some("C:/bench/p.sldprt"));
    session.notify_active_changed();
    let proxy = session.active_document().unwrap();
    proxy.subscribe(|event| {
        black_box(event);
    });

    c.bench_function("native_event_dispatch", |bench| {
        bench.iter(|| black_box(native.fire(NativeEvent::Modified)));
    });

    session.shutdown();
}

criterion_group!(
    benches,
    bench_active_change_churn,
    bench_reload_in_place,
    bench_native_event_dispatch
);
criterion_main!(benches);
