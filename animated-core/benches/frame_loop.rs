//! Benchmarks for the frame loop.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;

use animated_core::animation::{Animation, SpringAnimation, SpringConfig, SpringMotion};
use animated_core::graph::{FrameScheduler, Node};

fn bench_spring_integrator(c: &mut Criterion) {
    let params = SpringConfig::to(1.0).build().unwrap();

    c.bench_function("spring_motion_advance", |b| {
        b.iter(|| {
            let mut motion = SpringMotion::new(0.0, 0.0);
            let mut frame = 0;
            while !motion.finished {
                motion.advance(frame as f64 * 16.0, &params);
                frame += 1;
            }
            black_box(motion)
        })
    });
}

fn bench_memoized_pulls(c: &mut Criterion) {
    c.bench_function("pull_fan_in_64", |b| {
        let scheduler = FrameScheduler::new();
        let input = Node::value(1.0);
        let shared = Node::multiply(&input, 2.0);
        let leaves: Vec<Node> = (0..64).map(|i| Node::add(&shared, i as f64)).collect();

        let mut frame = 0.0;
        b.iter(|| {
            frame += 16.0;
            scheduler.run_frame(frame);
            for leaf in &leaves {
                black_box(leaf.number(&scheduler).unwrap());
            }
        })
    });
}

fn bench_animated_frames(c: &mut Criterion) {
    c.bench_function("frame_loop_32_springs", |b| {
        b.iter(|| {
            let scheduler = FrameScheduler::new();
            let mut springs = Vec::new();

            for i in 0..32 {
                let value = Node::value(0.0);
                let mut props = IndexMap::new();
                props.insert("opacity".to_string(), Node::multiply(&value, 0.5));
                let view = Node::props(props, |values| {
                    black_box(values);
                });
                view.attach(&scheduler).unwrap();

                let mut spring = SpringAnimation::new(SpringConfig::to(i as f64)).unwrap();
                spring.start(&scheduler, &value, None).unwrap();
                springs.push((spring, view));
            }

            let mut frame = 0;
            while scheduler.tick(frame as f64 * 16.0) {
                frame += 1;
            }
            black_box(frame)
        })
    });
}

criterion_group!(
    benches,
    bench_spring_integrator,
    bench_memoized_pulls,
    bench_animated_frames
);
criterion_main!(benches);
