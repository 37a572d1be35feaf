use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_framegraph::backend::dummy::DummyDevice;
use redlilium_framegraph::types::{ClearValue, Format, ResourceDescriptor, ResourceUsage};
use redlilium_framegraph::{FrameGraph, FrameGraphConfig, ResourceHandle, WaitPoint};

fn graph(parallel: bool) -> FrameGraph {
    let config = FrameGraphConfig::default().with_parallel_recording(parallel);
    FrameGraph::new(Arc::new(DummyDevice::new()), config).unwrap()
}

fn color(size: u32) -> ResourceDescriptor {
    ResourceDescriptor::texture_2d(size, size, Format::Rgba16Float, ResourceUsage::RENDER_TARGET)
}

/// Passes `0..count`, each reading the previous pass's target.
fn declare_chain(graph: &mut FrameGraph, count: usize, async_every: usize) {
    for i in 0..count {
        graph.add_pass(
            format!("pass_{i}"),
            move |b| {
                if async_every > 0 && i % async_every == async_every - 1 {
                    b.async_compute_enable(true);
                }
                // Handles from the previous frame are stale.
                if i == 0 {
                    b.blackboard().remove("prev");
                } else if let Some(&prev) = b.blackboard().get::<ResourceHandle>("prev") {
                    b.read(prev);
                }
                let desc = if b.is_async_compute() {
                    ResourceDescriptor::buffer(4096, 16, ResourceUsage::UNORDERED_ACCESS)
                } else {
                    color(512).with_clear(ClearValue::color(0.0, 0.0, 0.0, 1.0))
                };
                let target = b.create(desc);
                let target = b.write(target);
                b.blackboard().set("prev", target);
            },
            |_, _| {},
        );
    }
    graph.add_pass(
        "present",
        |b| {
            let last = *b.blackboard().get::<ResourceHandle>("prev").unwrap();
            b.read(last);
        },
        |_, _| {},
    );
}

fn run_frame(graph: &mut FrameGraph, previous: Option<WaitPoint>) -> WaitPoint {
    graph.compile().unwrap();
    graph.execute(previous).unwrap()
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

fn bench_compile_small(c: &mut Criterion) {
    let mut graph = graph(false);
    let mut previous = None;
    c.bench_function("framegraph_frame_4_passes", |b| {
        b.iter(|| {
            declare_chain(&mut graph, 4, 0);
            previous = Some(run_frame(&mut graph, previous));
            black_box(previous);
        });
    });
}

fn bench_compile_chain(c: &mut Criterion) {
    let mut graph = graph(false);
    let mut previous = None;
    c.bench_function("framegraph_frame_32_passes_chain", |b| {
        b.iter(|| {
            declare_chain(&mut graph, 32, 0);
            previous = Some(run_frame(&mut graph, previous));
            black_box(previous);
        });
    });
}

fn bench_compile_async_compute(c: &mut Criterion) {
    let mut graph = graph(false);
    let mut previous = None;
    c.bench_function("framegraph_frame_32_passes_async_every_4", |b| {
        b.iter(|| {
            declare_chain(&mut graph, 32, 4);
            previous = Some(run_frame(&mut graph, previous));
            black_box(graph.compile_stats().synthesized_passes);
        });
    });
}

fn bench_cull_unused(c: &mut Criterion) {
    let mut graph = graph(false);
    let mut previous = None;
    c.bench_function("framegraph_frame_48_passes_all_culled", |b| {
        b.iter(|| {
            for i in 0..48 {
                graph.add_pass(
                    format!("unused_{i}"),
                    |b| {
                        let target = b.create(color(256));
                        b.write(target);
                    },
                    |_, _| {},
                );
            }
            previous = Some(run_frame(&mut graph, previous));
            black_box(graph.compile_stats().culled_passes);
        });
    });
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

fn bench_record_parallel(c: &mut Criterion) {
    let mut graph = graph(true);
    let mut previous = None;
    c.bench_function("framegraph_frame_60_passes_parallel_recording", |b| {
        b.iter(|| {
            declare_chain(&mut graph, 60, 0);
            previous = Some(run_frame(&mut graph, previous));
            black_box(previous);
        });
    });
}

criterion_group!(
    compilation,
    bench_compile_small,
    bench_compile_chain,
    bench_compile_async_compute,
    bench_cull_unused,
);
criterion_group!(recording, bench_record_parallel);
criterion_main!(compilation, recording);
