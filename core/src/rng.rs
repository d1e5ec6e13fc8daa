use rand::{rngs::StdRng, SeedableRng};

/// Construct a deterministic RNG from a fixed seed.
///
/// Every source of randomness in the pipeline (split shuffle, batch
/// permutations, weight init) goes through this so a run is reproducible
/// from its seeds alone.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
