//! Fragmentation-measurement harness.
//!
//! Synthetic workload: toggle a fixed-width array of slots between
//! allocated and free, `REPTS` times, with uniformly random sizes up to
//! `MAX_ALLOC_SIZE`. Reports the peak aggregate payload observed (`max_Pi`),
//! the total bytes ever obtained from the OS (`Hk`), and the utilization
//! ratio `Uk = max_Pi / Hk` as a percentage.
//!
//! Usage: `fragbench [seed]` — an unsigned seed as the first positional
//! argument reproduces a prior run; omitted, the current time seeds the
//! PRNG instead. Exit code is always zero on completion.

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use segalloc::Heap;

const REPTS: usize = 100_000;
const NUM_PTRS: usize = 10_000;
const MAX_ALLOC_SIZE: usize = 4096;

fn parse_seed() -> u64 {
    match env::args().nth(1) {
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            eprintln!("fragbench: could not parse seed {arg:?}, falling back to time seed");
            time_seed()
        }),
        None => time_seed(),
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn main() {
    env_logger::init();

    let seed = parse_seed();
    eprintln!("Running fragmentation test with random seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);

    let mut heap = Heap::new();
    let mut slots: Vec<Option<std::ptr::NonNull<u8>>> = vec![None; NUM_PTRS];

    for _ in 0..REPTS {
        let idx = rng.gen_range(0..NUM_PTRS);
        if slots[idx].is_none() {
            let size = rng.gen_range(1..=MAX_ALLOC_SIZE);
            slots[idx] = heap.alloc(size);
        } else {
            heap.free(slots[idx].take());
        }
    }

    let hk = heap.get_heap_size();
    let max_pi = heap.get_peak_memory_usage();
    let uk = max_pi as f64 / hk as f64;

    println!("Maximum aggregate payload (max Pi): {max_pi} bytes");
    println!("Current heap size (Hk): {hk} bytes");
    println!("Peak memory utilization (Uk): {:.4}%", uk * 100.0);
}
