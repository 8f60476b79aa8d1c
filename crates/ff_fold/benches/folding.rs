use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;

use ff_energy::ModelDetails;
use ff_fold::FoldCompound;
use ff_fold::FoldOptions;

const SEQ: &str = "UCAGUCUUCGCUGCGCUGUAUCGAUUCGGUUUCAGUUUUUAUUGCGGGAAACCCAUGCAUGCCGUAGCUAGCUA";

pub fn mfe_folding(c: &mut Criterion) {
    let mut group = c.benchmark_group("MFE");
    let md = ModelDetails::default();

    group.bench_function("linear", |b| {
        b.iter(|| {
            let mut fc = FoldCompound::build(SEQ, &md, FoldOptions::MFE).unwrap();
            fc.mfe().unwrap()
        });
    });

    let circ = ModelDetails::default().with_circ(true);
    group.bench_function("circular", |b| {
        b.iter(|| {
            let mut fc = FoldCompound::build(SEQ, &circ, FoldOptions::MFE).unwrap();
            fc.mfe().unwrap()
        });
    });
}

pub fn pf_folding(c: &mut Criterion) {
    let mut group = c.benchmark_group("Partition function");
    let md = ModelDetails::default().with_pf_scale(1.0);

    group.bench_function("inside", |b| {
        b.iter(|| {
            let mut fc = FoldCompound::build(SEQ, &md, FoldOptions::PF).unwrap();
            fc.pf_without_probs().unwrap()
        });
    });

    group.bench_function("inside + outside", |b| {
        b.iter(|| {
            let mut fc = FoldCompound::build(SEQ, &md, FoldOptions::PF).unwrap();
            fc.pf().unwrap()
        });
    });
}

criterion_group!(benches, mfe_folding, pf_folding);
criterion_main!(benches);
