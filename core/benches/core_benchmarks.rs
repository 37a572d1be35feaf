use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_core::arena::{DoubleBuffered, FrameArena};
use redlilium_core::bounded::BoundedVec;
use redlilium_core::thread_pool::ThreadPool;

// ---------------------------------------------------------------------------
// Frame arena
// ---------------------------------------------------------------------------

fn bench_arena_fill_and_flip(c: &mut Criterion) {
    let mut frames = DoubleBuffered::from_fn(|| FrameArena::<[u64; 4]>::with_capacity(256));
    c.bench_function("arena_fill_256_and_flip", |b| {
        b.iter(|| {
            for i in 0..256u64 {
                let _ = black_box(frames.active_mut().alloc([i; 4]));
            }
            frames.flip();
        });
    });
}

// ---------------------------------------------------------------------------
// Bounded vector
// ---------------------------------------------------------------------------

fn bench_bounded_inline(c: &mut Criterion) {
    c.bench_function("bounded_vec_push_8_inline", |b| {
        b.iter(|| {
            let mut v = BoundedVec::new(8);
            for i in 0..8u32 {
                let _ = v.try_push(black_box(i));
            }
            black_box(v.len())
        });
    });
}

fn bench_bounded_spilled(c: &mut Criterion) {
    c.bench_function("bounded_vec_push_32_spilled", |b| {
        b.iter(|| {
            let mut v = BoundedVec::new(32);
            for i in 0..32u32 {
                let _ = v.try_push(black_box(i));
            }
            black_box(v.len())
        });
    });
}

// ---------------------------------------------------------------------------
// Thread pool
// ---------------------------------------------------------------------------

fn bench_thread_pool_fork_join(c: &mut Criterion) {
    let pool = ThreadPool::default_threads();
    let mut slots = vec![0u64; 64];
    c.bench_function("thread_pool_64_tasks", |b| {
        b.iter(|| {
            pool.scope(|s| {
                for (i, slot) in slots.iter_mut().enumerate() {
                    s.push(move || {
                        *slot = (0..256u64).fold(i as u64, |acc, x| acc.wrapping_mul(31) ^ x);
                    });
                }
            });
            black_box(slots[0])
        });
    });
}

criterion_group!(arena_benches, bench_arena_fill_and_flip);
criterion_group!(bounded_benches, bench_bounded_inline, bench_bounded_spilled);
criterion_group!(thread_pool_benches, bench_thread_pool_fork_join);

criterion_main!(arena_benches, bounded_benches, thread_pool_benches);
