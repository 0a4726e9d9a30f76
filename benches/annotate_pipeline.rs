use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fungal_traits_rust::data::{ReferenceData, SporeReference, TraitReference, TRAIT_HEADER};
use fungal_traits_rust::{parse_taxonomy, AnnotatorConfig, PrefixDetection, SporeFilterPolicy, Taxonomy, TraitAnnotator};
use polars::prelude::*;

const SPORE_TYPES: [&str; 4] = [
    "Mitospores",
    "Meiospores",
    "Multinucleate sexual spores",
    "Multinucleate asexual spores",
];

fn synthetic_references(genera: usize) -> ReferenceData {
    let rows = genera * 8;
    let names: Vec<String> = (0..rows).map(|i| format!("Genus{} species{}", i / 8, i)).collect();
    let genus: Vec<String> = (0..rows).map(|i| format!("Genus{}", i / 8)).collect();
    let family: Vec<String> = (0..rows).map(|i| format!("Family{}", i / 40)).collect();
    let types: Vec<&str> = (0..rows).map(|i| SPORE_TYPES[i % 4]).collect();
    let volumes: Vec<String> = (0..rows).map(|i| format!("{}", 1 + (i * 37) % 5000)).collect();

    let spore_df = df![
        "names_to_use" => names,
        "genus" => genus,
        "family" => family,
        "SporeType" => types,
        "SporeVolume" => volumes,
    ]
    .unwrap();

    let columns: Vec<Column> = TRAIT_HEADER
        .iter()
        .map(|&name| {
            let values: Vec<String> = (0..genera)
                .map(|g| match name {
                    "GENUS" => format!("Genus{}", g),
                    "Family" => format!("Family{}", g / 5),
                    _ => format!("{}_{}", name, g % 7),
                })
                .collect();
            Series::new(name.into(), values).into_column()
        })
        .collect();
    let trait_df = DataFrame::new(columns).unwrap();

    ReferenceData {
        spores: SporeReference::from_frame(&spore_df, SporeFilterPolicy::PositiveOnly).unwrap(),
        traits: TraitReference::from_frame(&trait_df).unwrap(),
    }
}

fn synthetic_taxonomy(features: usize, genera: usize) -> Taxonomy {
    let ids: Vec<String> = (0..features).map(|i| format!("asv{}", i)).collect();
    let taxa: Vec<String> = (0..features)
        .map(|i| {
            // Every third feature names a genus missing from the references
            let g = if i % 3 == 0 { genera + i } else { i % genera };
            format!(
                "d__Fungi;p__Ascomycota;f__Family{};g__Genus{};s__Genus{}_species{}",
                g / 5,
                g,
                g,
                i
            )
        })
        .collect();
    let df = df!["Feature ID" => ids, "Taxon" => taxa].unwrap();
    parse_taxonomy(&df, PrefixDetection::FirstCompleteRow).unwrap()
}

fn bench_annotate(c: &mut Criterion) {
    let genera = 2_000;
    let annotator = TraitAnnotator::from_references(AnnotatorConfig::default(), synthetic_references(genera));

    let mut group = c.benchmark_group("annotate_taxonomy");
    for features in [1_000_usize, 10_000] {
        let taxonomy = synthetic_taxonomy(features, genera);
        group.throughput(Throughput::Elements(features as u64));
        group.bench_with_input(BenchmarkId::from_parameter(features), &taxonomy, |b, taxonomy| {
            b.iter(|| black_box(annotator.annotate_taxonomy(black_box(taxonomy)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_annotate);
criterion_main!(benches);
