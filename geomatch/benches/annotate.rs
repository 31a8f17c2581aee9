//! Benchmarks de l'annotation de proximité

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{Coord, Geometry, Point};
use geomatch::proximity::{Annotator, InfrastructureIndex, Placement, SearchStrategy};
use geomatch::types::{Category, Feature, InfraClass, InfrastructurePoint, Properties};
use geomatch::{CoordUnits, EngineConfig};

/// Pseudo-aléatoire déterministe (LCG), pour des jeux reproductibles
fn lcg(seed: &mut u64) -> f64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (*seed >> 11) as f64 / (1u64 << 53) as f64
}

fn postes(n: usize, class: InfraClass) -> Vec<InfrastructurePoint> {
    let mut seed = 42;
    (0..n)
        .map(|i| InfrastructurePoint {
            id: format!("P{:06}", i),
            coord: Coord {
                x: 5.0 + lcg(&mut seed) * 0.5,
                y: 45.0 + lcg(&mut seed) * 0.5,
            },
            class,
        })
        .collect()
}

fn parcels(n: usize) -> Vec<Feature> {
    let mut seed = 7;
    (0..n)
        .map(|i| Feature {
            id: Some(format!("RPG{:06}", i)),
            geometry: Geometry::Point(Point::new(
                5.0 + lcg(&mut seed) * 0.5,
                45.0 + lcg(&mut seed) * 0.5,
            )),
            properties: Properties::new(),
            layer: "rpg".into(),
        })
        .collect()
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");
    let queries: Vec<Coord> = parcels(1_000)
        .iter()
        .filter_map(|f| f.representative_point())
        .collect();
    group.throughput(Throughput::Elements(queries.len() as u64));

    for size in [32usize, 500, 5_000] {
        for strategy in [SearchStrategy::Exhaustive, SearchStrategy::Indexed] {
            let index =
                InfrastructureIndex::with_strategy(postes(size, InfraClass::Bt), CoordUnits::Degrees, strategy);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", strategy), size),
                &index,
                |b, index| {
                    b.iter(|| {
                        for q in &queries {
                            black_box(index.nearest(black_box(*q)));
                        }
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_annotate_commune(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut points = postes(2_000, InfraClass::Bt);
    points.extend(postes(200, InfraClass::Hta));
    let annotator = Annotator::new(points, config.units);
    let features = parcels(5_000);
    let placement = Placement {
        category: Category::Parcelle,
        commune: "38185",
        dept: "38",
    };

    let mut group = c.benchmark_group("annotate");
    group.throughput(Throughput::Elements(features.len() as u64));
    group.bench_function("commune_5000", |b| {
        b.iter(|| {
            let records = annotator.annotate_all(black_box(features.clone()), placement, &config);
            black_box(records)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_nearest, bench_annotate_commune);
criterion_main!(benches);
