use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use ff_energy::Dangles;
use ff_energy::ModelDetails;
use ff_fold::FoldCompound;
use ff_fold::FoldOptions;
use ff_fold::PairKind;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_sequence(rng: &mut StdRng, len: usize) -> String {
    const NUC: [char; 4] = ['A', 'C', 'G', 'U'];
    (0..len).map(|_| NUC[rng.random_range(0..4)]).collect()
}

/// Sum of the probabilities of all pairs involving position k.
fn paired_probability(fc: &FoldCompound, k: usize) -> f64 {
    (1..=fc.len())
        .filter(|&l| l != k)
        .map(|l| {
            let (i, j) = if k < l { (k, l) } else { (l, k) };
            fc.pair_probability(i, j).unwrap()
        })
        .sum()
}

fn check_consistency(fc: &mut FoldCompound) {
    let mfe = fc.mfe().unwrap();
    let eval = fc.eval_structure(&mfe.structure).unwrap();
    assert!((mfe.energy - eval).abs() < 1e-9,
        "{}: mfe {} vs eval {}", mfe.structure, mfe.energy, eval);

    let ens = fc.pf().unwrap();
    assert!(ens <= mfe.energy + 1e-6, "ensemble {} above mfe {}", ens, mfe.energy);
    for k in 1..=fc.len() {
        let p = paired_probability(fc, k);
        assert!((-1e-9..=1.0 + 1e-9).contains(&p), "position {}: {}", k, p);
    }
}

#[test]
fn test_random_sequences() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(42);
    for dangles in [Dangles::None, Dangles::Double] {
        let md = ModelDetails::default().with_dangles(dangles);
        for _ in 0..10 {
            let len = rng.random_range(10..60);
            let seq = random_sequence(&mut rng, len);
            let mut fc = FoldCompound::build(&seq, &md, FoldOptions::default()).unwrap();
            check_consistency(&mut fc);
        }
    }
}

#[test]
fn test_random_circular_sequences() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(7);
    let md = ModelDetails::default().with_circ(true);
    for _ in 0..10 {
        let len = rng.random_range(15..50);
        let seq = random_sequence(&mut rng, len);
        let mut fc = FoldCompound::build(&seq, &md, FoldOptions::default()).unwrap();
        check_consistency(&mut fc);
    }
}

#[test]
fn test_random_hybrids() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(3);
    let md = ModelDetails::default();
    for _ in 0..5 {
        let a = random_sequence(&mut rng, 12);
        let b = random_sequence(&mut rng, 12);
        let dimer = format!("{}&{}", a, b);
        let opts = FoldOptions::default() | FoldOptions::HYBRID;
        let mut fc = FoldCompound::build(&dimer, &md, opts).unwrap();
        let mfe = fc.mfe().unwrap();
        assert_eq!(mfe.structure.find('&'), Some(12));
        assert!((fc.eval_structure(&mfe.structure).unwrap() - mfe.energy).abs() < 1e-9);
        let ens = fc.pf().unwrap();
        assert!(ens <= mfe.energy + 1e-6);
    }
}

#[test]
fn test_pf_scale_does_not_change_probabilities() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(11);
    let seq = random_sequence(&mut rng, 120);
    let plain = ModelDetails::default().with_pf_scale(1.0);
    let mut fc1 = FoldCompound::build(&seq, &plain, FoldOptions::PF).unwrap();
    let e1 = fc1.pf().unwrap();

    let mut fc2 = FoldCompound::build(&seq, &ModelDetails::default(), FoldOptions::PF).unwrap();
    let scale = fc2.prepare_pf_scale().unwrap();
    assert!(scale > 1.0);
    let e2 = fc2.pf().unwrap();
    assert!((e1 - e2).abs() < 1e-6, "{} vs {}", e1, e2);

    for (i, j) in [(1, 120), (10, 60), (30, 90)] {
        let p1 = fc1.pair_probability(i, j).unwrap();
        let p2 = fc2.pair_probability(i, j).unwrap();
        assert!((p1 - p2).abs() < 1e-9);
    }
}

#[test]
#[ignore = "long sequence, run with --ignored"]
fn test_long_sequence_needs_rescaling() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(2024);
    let seq = random_sequence(&mut rng, 800);
    let mut fc = FoldCompound::build(&seq, &ModelDetails::default(), FoldOptions::default()).unwrap();
    let mfe = fc.mfe().unwrap();
    let scale = fc.prepare_pf_scale().unwrap();
    assert!(scale > 1.0);
    let ens = fc.pf_without_probs().unwrap();
    assert!(ens.is_finite());
    assert!(ens <= mfe.energy);
    let total = fc.pf_matrices().unwrap().total;
    assert!(total.is_finite() && total > 0.0);

    // The unscaled partition function still fits into an f64 at this
    // length and gives the same ensemble energy.
    let plain = ModelDetails::default().with_pf_scale(1.0);
    let mut fc1 = FoldCompound::build(&seq, &plain, FoldOptions::PF).unwrap();
    let ens1 = fc1.pf_without_probs().unwrap();
    assert!(fc1.pf_matrices().unwrap().total > total);
    assert!((ens - ens1).abs() < 1e-6 * ens.abs().max(1.0), "{} vs {}", ens, ens1);
}

#[test]
fn test_alignment_folding() {
    init_logging();
    let rows = [
        "GGGGAAAACCCC",
        "GGGCAAAAGCCC",
        "GGGG-AAACCCC",
    ];
    let md = ModelDetails::default();
    let mut fc = FoldCompound::build_aligned(&rows, &md, FoldOptions::default()).unwrap();
    assert_eq!(fc.n_seq(), 3);
    let mfe = fc.mfe().unwrap();
    assert!(mfe.structure.starts_with("((("));
    assert!((fc.eval_structure(&mfe.structure).unwrap() - mfe.energy).abs() < 1e-9);
    let ens = fc.pf().unwrap();
    assert!(ens <= mfe.energy + 1e-6);
    assert!(fc.pair_probability(1, 12).unwrap() > 0.5);
}

#[test]
fn test_gquad_pair_list() {
    init_logging();
    let md = ModelDetails::default().with_gquad(true);
    let mut fc = FoldCompound::build("GGGAGGGAGGGAGGGAAAAA", &md, FoldOptions::default()).unwrap();
    fc.pf().unwrap();
    let list = fc.pair_list(0.1).unwrap();
    assert!(list.iter().any(|r| r.kind == PairKind::GQuad && (r.i, r.j) == (1, 15)));
}

#[test]
fn test_records_as_json() {
    init_logging();
    let md = ModelDetails::default();
    let mut fc = FoldCompound::build("GGGGAAAACCCC", &md, FoldOptions::default()).unwrap();
    let mfe = fc.mfe().unwrap();
    fc.pf().unwrap();

    let json = serde_json::to_string(&mfe).unwrap();
    let back: ff_fold::Solution = serde_json::from_str(&json).unwrap();
    assert_eq!(back, mfe);

    let info = fc.pair_info(&mfe.structure, 0.01).unwrap();
    let json = serde_json::to_string(&info).unwrap();
    let back: Vec<ff_fold::PairInfo> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), info.len());
    assert!(back.iter().zip(&info).all(|(a, b)| (a.i, a.j, a.bp, a.comp) == (b.i, b.j, b.bp, b.comp)));
}
