use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use diffmpm2d::core::ledger::bytes_per_particle_frame;
use diffmpm2d::math::Vector;
use diffmpm2d::{DiffMpmState, LatticeLayout, SimulationConfig};

// Memory tracking allocator
struct TrackingAllocator;

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ret = unsafe { System.alloc(layout) };
        if !ret.is_null() {
            ALLOCATED.fetch_add(layout.size(), Ordering::SeqCst);
        }
        ret
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        ALLOCATED.fetch_sub(layout.size(), Ordering::SeqCst);
    }
}

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

fn get_memory_usage() -> usize {
    ALLOCATED.load(Ordering::SeqCst)
}

fn main() {
    let baseline = get_memory_usage();
    println!("Baseline memory: {} KB", baseline / 1024);
    println!("Per particle per frame: {} bytes (x2 with adjoint)\n", bytes_per_particle_frame());

    for &(side, steps) in &[(20, 64), (40, 256), (80, 1024)] {
        let config = SimulationConfig::default()
            .with_steps(steps)
            .with_lattice(LatticeLayout::new(side, 0.5, Vector::new(10.0, 25.0)));

        let before = get_memory_usage();
        let state = match DiffMpmState::new(config) {
            Ok(state) => state,
            Err(err) => panic!("benchmark scenario rejected: {err}"),
        };
        let measured = get_memory_usage() - before;

        println!(
            "n={} steps={}: allocated {} KB, ledger estimate {} KB",
            state.particle_count(),
            steps,
            measured / 1024,
            state.ledger_bytes() / 1024
        );
        drop(state);
    }

    println!("\nMemory after drop: {} KB", get_memory_usage() / 1024);
}
