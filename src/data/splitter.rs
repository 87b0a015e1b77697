// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Randomly shuffles row indices and splits them into two sets.
// Used twice:
//   - raw table → train / test   (test_size, e.g. 0.2)
//   - train     → fit / validation inside the trainer (val_split)
//
// Sizes follow the usual convention:
//   n_holdout = ceil(fraction * n)
//   n_keep    = n - n_holdout
// so 8 rows at 0.2 give 6 / 2.
//
// Shuffling uses a seeded StdRng so a run can be reproduced.
//
// Reference: rand crate documentation (SliceRandom, SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Number of rows that go to the held-out side.
pub fn holdout_count(total: usize, fraction: f64) -> usize {
    let fraction = fraction.clamp(0.0, 1.0);
    // The epsilon keeps 0.2 * 100 at 20 despite float noise
    ((total as f64) * fraction - 1e-9).ceil().max(0.0) as usize
}

/// Shuffle 0..total and split into (kept, held_out) index lists.
pub fn split_indices(total: usize, holdout_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..total).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_holdout = holdout_count(total, holdout_fraction).min(total);
    let held_out  = indices.split_off(total - n_holdout);

    tracing::debug!(
        "Split {} rows: {} kept, {} held out",
        total,
        indices.len(),
        held_out.len()
    );

    (indices, held_out)
}

/// Shuffle `samples` and split into (kept, held_out).
pub fn train_test_split<T>(samples: Vec<T>, holdout_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let (keep_idx, hold_idx) = split_indices(samples.len(), holdout_fraction, seed);

    let mut slots: Vec<Option<T>> = samples.into_iter().map(Some).collect();
    let mut take = |ids: Vec<usize>| -> Vec<T> {
        ids.into_iter().filter_map(|i| slots[i].take()).collect()
    };
    let kept     = take(keep_idx);
    let held_out = take(hold_idx);
    (kept, held_out)
}
