//! Fixed-width integer & hash algebra: difficulty/target conversion and
//! retargeting over 256-bit unsigned integers.
//!
//! `difficulty`/`compute_target`/`next_target` operate over 256-bit
//! unsigned integers via `primitive_types::U256` rather than hand-rolled
//! big-integer code.

use primitive_types::U256;

/// `difficulty(target) = 2^256 / (2^256 - numeric(target))`, or `0` when
/// `target` is `0` (no block can ever be mined against a zero target).
///
/// `2^256` doesn't fit in a `U256`, so the division is rewritten using
/// `denom = 2^256 - target`: since `2^256 = denom + target`,
/// `2^256 / denom == 1 + target / denom` exactly, which only ever needs
/// values `<= U256::MAX`.
pub fn difficulty(target: U256) -> U256 {
    if target.is_zero() {
        return U256::zero();
    }
    let denom = U256::MAX - target + U256::one(); // 2^256 - target, exact: target < 2^256
    U256::one().saturating_add(target / denom)
}

/// `compute_target(diff) = 2^256 - 2^256/diff`.
///
/// `diff == 0` is not a meaningful difficulty; callers never pass it
/// (difficulty is always `>= 1` once retargeted from a nonzero target).
pub fn compute_target(diff: U256) -> U256 {
    if diff.is_zero() {
        return U256::MAX;
    }
    if diff == U256::one() {
        return U256::zero();
    }
    // 2^256 / diff, computed the same split way as in `difficulty`.
    let quotient_of_max = U256::MAX / diff;
    let remainder_bumped = U256::MAX - diff * quotient_of_max + U256::one();
    let two_pow_256_over_diff = if remainder_bumped == diff {
        quotient_of_max.saturating_add(U256::one())
    } else {
        quotient_of_max
    };
    U256::MAX.saturating_sub(two_pow_256_over_diff).saturating_add(U256::one())
}

/// Next target given the previous target and a fixed-point scale factor
/// `scale = floor(2^32 * TIME_PER_PERIOD / observed_period_time)`.
///
/// `next_difficulty = 1 + (d*scale - 1) / 2^32`, `next_target =
/// compute_target(next_difficulty)`.
pub fn next_target(prev_target: U256, scale: u64) -> U256 {
    let d = difficulty(prev_target);
    let scaled = d.saturating_mul(U256::from(scale));
    let next_difficulty = if scaled.is_zero() {
        U256::one()
    } else {
        U256::one() + (scaled - U256::one()) / (U256::one() << 32)
    };
    compute_target(next_difficulty.max(U256::one()))
}

/// `floor(2^32 * TIME_PER_PERIOD / observed_period_time)`, saturating to
/// `u64::MAX` if the observed period is implausibly short (near-zero).
pub fn retarget_scale(time_per_period: u64, observed: u64) -> u64 {
    if observed == 0 {
        return u64::MAX;
    }
    let numerator = (time_per_period as u128) << 32;
    (numerator / observed as u128).min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_of_zero_target_is_zero() {
        assert_eq!(difficulty(U256::zero()), U256::zero());
    }

    #[test]
    fn difficulty_of_max_target_saturates() {
        // numeric(target) == 2^256 - 1: denominator is 1, difficulty is
        // enormous and saturates at U256::MAX rather than overflowing.
        assert_eq!(difficulty(U256::MAX), U256::MAX);
    }

    #[test]
    fn difficulty_of_half_target_is_two() {
        // numeric(target) == 2^255 (half of 2^256): denominator is also
        // 2^255, so difficulty is exactly 2.
        let half = U256::one() << 255;
        assert_eq!(difficulty(half), U256::from(2u64));
    }

    #[test]
    fn compute_target_round_trips_small_difficulties() {
        for d in [2u64, 4, 16, 256, 1024] {
            let target = compute_target(U256::from(d));
            let back = difficulty(target);
            // Integer division loses precision; the round trip should
            // land within 1 of the original difficulty.
            let diff = if back > U256::from(d) { back - U256::from(d) } else { U256::from(d) - back };
            assert!(diff <= U256::from(1u64), "d={} back={}", d, back);
        }
    }

    #[test]
    fn next_target_converges_toward_target_block_time() {
        // Simulate blocks mined twice as fast as the target: scale should
        // roughly double the difficulty (lower the target).
        let initial_target = compute_target(U256::from(256u64));
        let scale = retarget_scale(60_000, 30_000); // observed twice as fast
        let retargeted = next_target(initial_target, scale);
        assert!(retargeted < initial_target, "target should shrink when blocks arrive too fast");
    }

    #[test]
    fn next_target_relaxes_when_blocks_are_slow() {
        let initial_target = compute_target(U256::from(256u64));
        let scale = retarget_scale(60_000, 120_000); // observed twice as slow
        let retargeted = next_target(initial_target, scale);
        assert!(retargeted > initial_target, "target should grow when blocks arrive too slowly");
    }
}
