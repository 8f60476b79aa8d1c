use std::alloc::GlobalAlloc;
use std::alloc::Layout;
use std::alloc::System;
use std::cell::Cell;

use ff_energy::ModelDetails;
use ff_fold::AllocMask;
use ff_fold::FoldCompound;
use ff_fold::FoldError;
use ff_fold::FoldOptions;
use ff_fold::MfeMatrices;
use ff_fold::PfMatrices;

/// Counts the live heap bytes of the current thread. Every test runs on
/// its own thread, so the counters do not interfere.
struct Tracking;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

fn track(delta: isize) {
    let _ = LIVE.try_with(|c| c.set(c.get() + delta));
}

fn live() -> isize {
    LIVE.with(|c| c.get())
}

unsafe impl GlobalAlloc for Tracking {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            track(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        track(-(layout.size() as isize));
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: Tracking = Tracking;

const SEQ: &str = "GGGAAAUCCCAGCUAGCUAGGGAAACCCUUCGAGCUAGCAUCGA";

/// Build and fold once so that lazily parsed parameter tables are
/// allocated before anything is measured.
fn warm_up(md: &ModelDetails) {
    let mut fc = FoldCompound::build(SEQ, md, FoldOptions::default()).unwrap();
    fc.mfe().unwrap();
    fc.pf().unwrap();
}

#[test]
fn test_mfe_masks() {
    let n = 40;
    for mask in [
        AllocMask::MFE_DEFAULT,
        AllocMask::MFE_DEFAULT | AllocMask::F3,
        AllocMask::MFE_DEFAULT | AllocMask::CIRC,
        AllocMask::MFE_DEFAULT | AllocMask::FC | AllocMask::GQUAD,
        AllocMask::C,
    ] {
        let before = live();
        let m = MfeMatrices::allocate(n, mask).unwrap();
        assert_eq!(m.present(), mask);
        assert_eq!(live() - before, m.bytes() as isize);
        drop(m);
        assert_eq!(live(), before);
    }
}

#[test]
fn test_pf_masks() {
    let n = 40;
    for mask in [
        AllocMask::PF_WO_PROBS,
        AllocMask::PF_DEFAULT,
        AllocMask::PF_DEFAULT | AllocMask::CIRC,
        AllocMask::PF_DEFAULT | AllocMask::GQUAD,
    ] {
        let before = live();
        let m = PfMatrices::allocate(n, mask).unwrap();
        assert_eq!(m.present(), mask);
        assert_eq!(m.g_probs.is_some(), mask.contains(AllocMask::GQUAD | AllocMask::PROBS));
        assert_eq!(live() - before, m.bytes() as isize);
        drop(m);
        assert_eq!(live(), before);
    }
}

#[test]
fn test_compound_releases_everything() {
    for md in [
        ModelDetails::default(),
        ModelDetails::default().with_circ(true),
        ModelDetails::default().with_gquad(true),
    ] {
        warm_up(&md);
        let before = live();
        let mut fc = FoldCompound::build(SEQ, &md, FoldOptions::default()).unwrap();
        let mfe = fc.mfe().unwrap();
        fc.pf().unwrap();
        assert!(live() > before);
        drop(mfe);
        drop(fc);
        assert_eq!(live(), before);
    }
}

#[test]
fn test_new_constraints_discard_matrices() {
    let md = ModelDetails::default();
    warm_up(&md);
    let mut fc = FoldCompound::build(SEQ, &md, FoldOptions::default()).unwrap();
    fc.mfe().unwrap();
    fc.pf().unwrap();
    let bytes = fc.mfe_matrices().unwrap().bytes() + fc.pf_matrices().unwrap().bytes();
    let before = live();
    fc.attach_constraints(None, None).unwrap();
    assert!(fc.mfe_matrices().is_none());
    assert!(fc.pf_matrices().is_none());
    assert_eq!(before - live(), bytes as isize);
}

#[test]
fn test_allocation_failure_is_an_error() {
    let before = live();
    let r = MfeMatrices::allocate(1 << 28, AllocMask::C);
    assert!(matches!(r, Err(FoldError::Allocation { array: "c", .. })));
    assert_eq!(live(), before);
}
