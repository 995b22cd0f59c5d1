//! Statement translation benchmarks: cold scan-and-resolve vs the cost
//! of re-translating without a cache.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use porta_core::params;
use porta_db::dialect::{descriptor, DialectContext};
use porta_db::translate::translate;

const STATEMENT: &str = "SELECT account_id, account_name, expire_date
FROM [:table schema=ident name=account_info] a,
     [:table schema=ident name=person_info] p
WHERE a.owner_id = p.person_id
  AND p.person_id = :person_id
  AND a.expire_date > [:now]
  AND a.account_name = :name";

fn bench_translate(c: &mut Criterion) {
    let ctx = DialectContext::default();
    let params = params! { "person_id" => 42, "name" => "bootsie" };

    for backend in ["postgres", "oracle", "sqlite"] {
        let desc = descriptor(backend).unwrap();
        c.bench_function(&format!("translate_{backend}"), |b| {
            b.iter(|| translate(&desc, &ctx, black_box(STATEMENT), &params).unwrap())
        });
    }

    let desc = descriptor("postgres").unwrap();
    c.bench_function("translate_plain", |b| {
        b.iter(|| {
            translate(
                &desc,
                &ctx,
                black_box("SELECT 1 FROM t WHERE a = 1"),
                &params,
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_translate);
criterion_main!(benches);
