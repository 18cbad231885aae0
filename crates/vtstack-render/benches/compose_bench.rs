//! Benchmarks for window-stack compositing.
//!
//! Measures merging damaged areas into the virtual terminal and
//! regenerating a rectangle from the full stack after a move.
//!
//! Run with: cargo bench -p vtstack-render --bench compose_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use vtstack_core::geometry::{Point, Rect, Size};
use vtstack_render::arena::AreaId;
use vtstack_render::cell::{Cell, Color, StyleFlags, Transparency};
use vtstack_render::context::{CompositorContext, ContextConfig};

/// A context with `count` overlapping windows, each with a shadow.
fn stacked(w: u16, h: u16, count: u16) -> (CompositorContext, Vec<AreaId>) {
    let config = ContextConfig::default().with_size(Size::new(w, h));
    let mut ctx = CompositorContext::new(config).unwrap();
    let shade = Cell::new(' ')
        .with_fg(Color::LIGHT_GRAY)
        .with_bg(Color::BLACK)
        .with_transparency(Transparency::Shadow);
    let mut areas = Vec::new();
    for i in 0..count {
        let (aw, ah) = (w / 2, h / 2);
        let offset = Point::new(i32::from(i * 3), i32::from(i));
        let area = ctx
            .acquire_area(offset, Size::new(aw, ah), Size::new(1, 1), None)
            .unwrap();
        ctx.set_output_attributes(Color::WHITE, Color::Indexed(i as u8 + 1), StyleFlags::empty());
        ctx.clear_area(area, 'x').unwrap();
        let a = ctx.area_mut(area).unwrap();
        for y in 0..=i32::from(ah) {
            a.write_at(i32::from(aw), y, shade);
        }
        for x in 0..=i32::from(aw) {
            a.write_at(x, i32::from(ah), shade);
        }
        ctx.push_window(Some(area), None);
        areas.push(area);
    }
    ctx.update_vterm();
    (ctx, areas)
}

fn bench_update_vterm(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose/update_vterm");

    for (w, h) in [(80, 24), (200, 60)] {
        for windows in [1u16, 4, 8] {
            let (mut ctx, areas) = stacked(w, h, windows);
            let cells = u64::from(w / 2) * u64::from(h / 2) * u64::from(windows);
            group.throughput(Throughput::Elements(cells));
            group.bench_with_input(
                BenchmarkId::new(format!("{windows}win"), format!("{w}x{h}")),
                &(),
                |b, _| {
                    b.iter(|| {
                        for &area in &areas {
                            ctx.area_mut(area).unwrap().mark_all_dirty();
                        }
                        black_box(ctx.update_vterm());
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_move_and_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose/move");

    for (w, h) in [(80, 24), (200, 60)] {
        let (mut ctx, areas) = stacked(w, h, 4);
        let target = areas[1];
        let mut step = 0i32;
        group.bench_with_input(BenchmarkId::new("move_window", format!("{w}x{h}")), &(), |b, _| {
            b.iter(|| {
                step = (step + 1) % 8;
                ctx.move_area(target, Point::new(step, step / 2)).unwrap();
                black_box(ctx.update_vterm());
            })
        });

        let (mut ctx, _) = stacked(w, h, 4);
        group.bench_with_input(BenchmarkId::new("restore_full", format!("{w}x{h}")), &(), |b, _| {
            b.iter(|| {
                ctx.restore_vterm(Rect::new(0, 0, w, h));
                black_box(ctx.vterm());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_update_vterm, bench_move_and_restore);
criterion_main!(benches);
