use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use ff_energy::INF;
use ff_energy::Dangles;
use ff_energy::ModelDetails;
use ff_fold::Decomposition;
use ff_fold::FoldCompound;
use ff_fold::FoldError;
use ff_fold::FoldOptions;
use ff_fold::HardConstraints;
use ff_fold::LoopContext;
use ff_fold::SoftConstraintSet;
use ff_fold::SoftConstraints;

const SEQ: &str = "GGGAGCUCCAAAGGAGCUCCC";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn compound(seq: &str) -> FoldCompound {
    let md = ModelDetails::default().with_dangles(Dangles::None);
    FoldCompound::build(seq, &md, FoldOptions::default()).unwrap()
}

#[test]
fn test_unpaired_position_in_every_matrix() {
    init_logging();
    let mut fc = compound(SEQ);
    let n = fc.len();
    let mut hc = HardConstraints::new(n);
    hc.force_unpaired(5);
    fc.attach_constraints(Some(hc), None).unwrap();

    let mfe = fc.mfe().unwrap();
    assert_eq!(mfe.structure.chars().nth(4), Some('.'));
    fc.pf().unwrap();

    let idx = fc.index().clone();
    let c = fc.mfe_matrices().unwrap().c().unwrap();
    let pf = fc.pf_matrices().unwrap();
    let qb = pf.qb().unwrap();
    let probs = pf.probs().unwrap();
    for k in 1..=n {
        if k == 5 {
            continue;
        }
        let (i, j) = if k < 5 { (k, 5) } else { (5, k) };
        assert_eq!(c[idx.ji(i, j)], INF);
        assert_eq!(qb[idx.ij(i, j)], 0.0);
        assert_eq!(probs[idx.ij(i, j)], 0.0);
    }
}

#[test]
fn test_constraint_string() {
    init_logging();
    let mut fc = compound("GGGAAACCCAGGGAAACCC");
    assert!(HardConstraints::from_constraint_string("((.......)").is_err());
    assert!(HardConstraints::from_constraint_string("(.......)).").is_err());
    assert!(HardConstraints::from_constraint_string("...?...").is_err());

    let hc = HardConstraints::from_constraint_string("(.......).xxxxxxxxx").unwrap();
    fc.attach_constraints(Some(hc), None).unwrap();
    let mfe = fc.mfe().unwrap();
    assert!(mfe.structure.starts_with('('));
    assert_eq!(mfe.structure.chars().nth(8), Some(')'));
    assert!(mfe.structure[10..].chars().all(|c| c == '.'));

    fc.pf().unwrap();
    assert!((fc.pair_probability(1, 9).unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(fc.pair_probability(11, 19).unwrap(), 0.0);
}

#[test]
fn test_context_restricted_pair() {
    init_logging();
    let mut fc = compound("GGGAAACCC");
    let mut hc = HardConstraints::new(9);
    // (1, 9) may only close a hairpin or be enclosed by a multiloop.
    hc.restrict_pair(1, 9, LoopContext::HP | LoopContext::ML_ENC);
    fc.attach_constraints(Some(hc), None).unwrap();
    assert!(matches!(fc.eval_structure("(((...)))"), Err(FoldError::NoValidStructure)));
    let mfe = fc.mfe().unwrap();
    assert_ne!(mfe.structure, "(((...)))");
}

#[test]
fn test_impossible_constraints() {
    init_logging();
    let mut fc = compound("AAAAAAAAA");
    let hc = HardConstraints::from_constraint_string("..|......").unwrap();
    fc.attach_constraints(Some(hc), None).unwrap();
    assert!(matches!(fc.mfe(), Err(FoldError::NoValidStructure)));
    assert!(matches!(fc.pf(), Err(FoldError::NoValidEnsemble(_))));
}

#[test]
fn test_unpaired_bonus() {
    init_logging();
    let mut fc = compound("GGGAAACCC");
    let mut sc = SoftConstraints::new(9);
    for i in 1..=9 {
        sc.set_unpaired(i, -500).unwrap();
    }
    fc.attach_constraints(None, Some(SoftConstraintSet::Shared(sc))).unwrap();
    let mfe = fc.mfe().unwrap();
    assert_eq!(mfe.structure, ".........");
    assert!((mfe.energy - (-45.0)).abs() < 1e-9);
    assert!((fc.eval_structure(".........").unwrap() - (-45.0)).abs() < 1e-9);
}

#[test]
fn test_energy_callback() {
    init_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sc = SoftConstraints::new(9).with_energy_callback(Arc::new(move |i, j, _, _, d| {
        counter.fetch_add(1, Ordering::Relaxed);
        if d == Decomposition::Hairpin && (i, j) == (2, 8) { -1000 } else { 0 }
    }));
    let mut fc = compound("GGGAAACCC");
    fc.attach_constraints(None, Some(SoftConstraintSet::Shared(sc))).unwrap();
    let mfe = fc.mfe().unwrap();
    assert!(calls.load(Ordering::Relaxed) > 0);
    assert_eq!(&mfe.structure[1..8], "(.....)");
    assert!((fc.eval_structure(&mfe.structure).unwrap() - mfe.energy).abs() < 1e-9);
}

#[test]
fn test_weight_callback_removes_pair() {
    init_logging();
    let sc = SoftConstraints::new(9).with_weight_callback(Arc::new(|i, j, _, _, d| {
        if d == Decomposition::Pair && (i, j) == (1, 9) { 0.0 } else { 1.0 }
    }));
    let mut fc = compound("GGGAAACCC");
    fc.attach_constraints(None, Some(SoftConstraintSet::Shared(sc))).unwrap();
    fc.pf().unwrap();
    assert_eq!(fc.pair_probability(1, 9).unwrap(), 0.0);
    assert!(fc.pair_probability(2, 8).unwrap() > 0.0);
}

#[test]
fn test_per_sequence_soft_constraints() {
    init_logging();
    let rows = ["GGGAAACCC", "GGGAAACCC"];
    let md = ModelDetails::default().with_dangles(Dangles::None);
    let mut fc = FoldCompound::build_aligned(&rows, &md, FoldOptions::default()).unwrap();
    let reference = fc.mfe().unwrap();

    let mut penalized = SoftConstraints::new(9);
    penalized.add_pair(1, 9, 400).unwrap();
    let set = SoftConstraintSet::PerSequence(vec![penalized, SoftConstraints::new(9)]);
    fc.attach_constraints(None, Some(set)).unwrap();
    let e = fc.eval_structure(&reference.structure).unwrap();
    // One of two sequences pays 4 kcal/mol.
    assert!((e - (reference.energy + 2.0)).abs() < 1e-9);

    let wrong = SoftConstraintSet::PerSequence(vec![SoftConstraints::new(9)]);
    assert!(fc.attach_constraints(None, Some(wrong)).is_err());
}
