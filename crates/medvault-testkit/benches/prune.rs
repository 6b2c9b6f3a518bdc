//! Benchmarks for expiry pruning and authorization.

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use medvault_core::{prune_expired, ConsentGrant, DocumentId, PrincipalId, RequestId, HOUR_MS};
use medvault_testkit::{TestVault, START};

fn grants(count: usize) -> Vec<ConsentGrant> {
    let owner = PrincipalId::new("patient").unwrap();
    let docs: BTreeSet<DocumentId> = (0..4u8).map(|i| DocumentId::from_bytes([i; 16])).collect();
    (0..count)
        .map(|i| {
            let grantee = PrincipalId::new(format!("doctor-{}", i)).unwrap();
            // Half the grants expire within the first hour.
            let hours = if i % 2 == 0 { 1 } else { 48 };
            ConsentGrant::issue(
                owner.clone(),
                grantee,
                docs.clone(),
                START,
                hours,
                RequestId::generate(),
            )
            .unwrap()
        })
        .collect()
}

fn bench_prune_expired(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune_expired");
    for count in [10, 100, 1_000] {
        let set = grants(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &set, |b, set| {
            b.iter(|| prune_expired(black_box(set.iter()), START + 2 * HOUR_MS))
        });
    }
    group.finish();
}

fn bench_authorize(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let t = TestVault::new();
    let patient = t.principal("patient");
    let doctor = t.principal("doctor");
    let doc = rt.block_on(async {
        let docs = t.upload_many(&patient, 8).await;
        t.grant(&patient, &doctor, &docs, 24).await;
        docs[0]
    });

    c.bench_function("authorize", |b| {
        b.iter(|| {
            rt.block_on(t.vault.authorize(&patient, &doctor, black_box(&doc)))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_prune_expired, bench_authorize);
criterion_main!(benches);
