use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use groupcart_cart::{EntryStore, ReconciliationEngine};
use groupcart_core::{EntryId, MenuItemId, Price, SizeId, UserId};
use groupcart_events::ChangeEvent;
use uuid::Uuid;

/// `entries` entries, each rewritten `versions` times by three writers,
/// delivered in reverse order with every event duplicated.
fn event_stream(entries: u128, versions: u64) -> Vec<ChangeEvent> {
    let writers = ["alice", "bob", "carol"];
    let mut events = Vec::new();

    for entry in 0..entries {
        for version in 1..=versions {
            let writer = writers[(version as usize) % writers.len()];
            let event = ChangeEvent {
                entry_id: EntryId::from_uuid(Uuid::from_u128(entry + 1)),
                quantity: (version % 5) as u32,
                unit_price: Price::from_cents(1299),
                menu_item_id: MenuItemId::new("margherita").unwrap(),
                size_id: SizeId::new("medium").unwrap(),
                added_by: UserId::new("alice").unwrap(),
                version,
                last_writer_id: UserId::new(writer).unwrap(),
            };
            events.push(event.clone());
            events.push(event);
        }
    }

    events.reverse();
    events
}

fn bench_merge_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_all");
    let engine = ReconciliationEngine::new();

    for &entries in &[10u128, 100, 1_000] {
        let events = event_stream(entries, 8);
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &events, |b, events| {
            b.iter(|| {
                let mut store = EntryStore::new();
                let report = engine.merge_all(&mut store, events.iter());
                black_box((store.len(), report))
            })
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let engine = ReconciliationEngine::new();
    let mut store = EntryStore::new();
    engine.merge_all(&mut store, event_stream(1_000, 3).iter());

    c.bench_function("snapshot_1000", |b| {
        b.iter(|| black_box(store.snapshot().len()))
    });
    c.bench_function("subtotal_1000", |b| b.iter(|| black_box(store.subtotal())));
}

criterion_group!(benches, bench_merge_all, bench_snapshot);
criterion_main!(benches);
