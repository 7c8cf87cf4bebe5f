use criterion::{Criterion, criterion_group, criterion_main};
use esox_resourcepool::{Pool, PoolConfiguration, Resource};
use std::convert::Infallible;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Handle(u64);

impl Resource for Handle {
    type Error = Infallible;

    fn add(&self) -> Result<Self, Self::Error> {
        Ok(Handle(self.0 + 1))
    }
}

fn config(size: usize) -> PoolConfiguration {
    PoolConfiguration::new()
        .with_pool_size(size)
        .with_timeout(Duration::from_secs(1))
}

fn bench_single_thread(c: &mut Criterion) {
    let pool = Pool::initialize(&Handle(0), config(16)).unwrap();

    c.bench_function("acquire_release", |b| {
        b.iter(|| {
            let handle = pool.acquire().unwrap();
            black_box(handle.0);
            pool.release(handle).unwrap();
        })
    });

    c.bench_function("guard", |b| {
        b.iter(|| {
            let handle = pool.get().unwrap();
            black_box(handle.0);
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    let pool = Arc::new(Pool::initialize(&Handle(0), config(4)).unwrap());

    c.bench_function("acquire_release_4_threads", |b| {
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..4 {
                    let pool = Arc::clone(&pool);
                    scope.spawn(move || {
                        for _ in 0..100 {
                            let handle = pool.acquire().unwrap();
                            black_box(handle.0);
                            pool.release(handle).unwrap();
                        }
                    });
                }
            })
        })
    });
}

criterion_group!(benches, bench_single_thread, bench_contended);
criterion_main!(benches);
