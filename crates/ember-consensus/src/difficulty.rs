//! Difficulty regulation.
//!
//! Two rules compose. Interval retargeting rescales the target by the
//! observed timespan of the last adjustment window, clamped to a 4x
//! band. The progressive floor then bounds how easy the target may be:
//! every difficulty epoch the maximum allowed target halves, so the
//! chain can never become trivially mineable at high heights even if
//! hash rate disappears.

use crate::block::Block;
use crate::pow::{bits_to_target, target_to_bits};
use num_bigint::BigUint;
use tracing::debug;

/// Epoch shifts are capped so the floor target cannot collapse to zero.
const MAX_FLOOR_EPOCHS: u64 = 60;

/// Standard interval retargeting with bounded adjustment.
///
/// `blocks` is the recent chain in ascending height order. The result
/// is not floor-clamped; callers apply [`apply_progressive_floor`].
pub fn calc_next_bits(
    blocks: &[Block],
    adjust_interval: u64,
    target_seconds: i64,
    min_bits: u32,
) -> u32 {
    let n = blocks.len();
    if n == 0 {
        return min_bits;
    }
    // A full window is required before retargeting kicks in.
    if (n as u64) < adjust_interval {
        return blocks[n - 1].header.bits;
    }

    let last = &blocks[n - 1];
    let first = &blocks[n - adjust_interval as usize];

    let expected = adjust_interval as i64 * target_seconds;
    let actual = (last.header.timestamp - first.header.timestamp).clamp(expected / 4, expected * 4);

    let current_target = bits_to_target(last.header.bits);
    let new_target = current_target * BigUint::from(actual as u64) / BigUint::from(expected as u64);

    // Never easier than the minimum difficulty.
    let max_target = bits_to_target(min_bits);
    let new_target = new_target.min(max_target);

    let new_bits = target_to_bits(&new_target);
    debug!(
        height = last.header.height + 1,
        actual, expected, new_bits, "retargeted difficulty"
    );
    new_bits
}

/// The easiest bits allowed at a height.
///
/// Epoch 0 allows `min_bits`; each later epoch halves the maximum
/// target, with the epoch count capped and an underflowed target raised
/// back to 1.
pub fn progressive_floor(height: u64, epoch_blocks: u64, min_bits: u32) -> u32 {
    if epoch_blocks == 0 {
        return min_bits;
    }
    let epoch = (height / epoch_blocks).min(MAX_FLOOR_EPOCHS);
    if epoch == 0 {
        return min_bits;
    }
    let mut floor_target = bits_to_target(min_bits) >> epoch as usize;
    if floor_target.bits() == 0 {
        floor_target = BigUint::from(1u32);
    }
    target_to_bits(&floor_target)
}

/// Clamp bits so the target never exceeds the progressive floor for the
/// height. A larger target means easier mining; candidates above the
/// floor are replaced by it.
pub fn apply_progressive_floor(bits: u32, height: u64, epoch_blocks: u64, min_bits: u32) -> u32 {
    let floor_bits = progressive_floor(height, epoch_blocks, min_bits);
    if bits_to_target(bits) > bits_to_target(floor_bits) {
        floor_bits
    } else {
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockHeader, ZERO_HASH_HEX};

    const MIN_BITS: u32 = 0x1f00ffff;

    fn block_at(height: u64, timestamp: i64, bits: u32) -> Block {
        Block {
            header: BlockHeader {
                version: 2,
                prev_hash: ZERO_HASH_HEX.to_string(),
                merkle_root: ZERO_HASH_HEX.to_string(),
                timestamp,
                bits,
                nonce: 0,
                height,
            },
            transactions: Vec::new(),
            hash: String::new(),
        }
    }

    fn window(spacing: i64, count: u64, bits: u32) -> Vec<Block> {
        (0..count)
            .map(|i| block_at(i, i as i64 * spacing, bits))
            .collect()
    }

    #[test]
    fn empty_window_yields_min_bits() {
        assert_eq!(calc_next_bits(&[], 10, 60, MIN_BITS), MIN_BITS);
    }

    #[test]
    fn short_window_keeps_previous_bits() {
        let blocks = window(60, 5, 0x1e00ffff);
        assert_eq!(calc_next_bits(&blocks, 10, 60, MIN_BITS), 0x1e00ffff);
    }

    #[test]
    fn on_target_timing_keeps_difficulty() {
        let blocks = window(60, 10, 0x1d00ffff);
        let bits = calc_next_bits(&blocks, 10, 60, MIN_BITS);
        // 9 spacings over a 10-block window: slightly under expected
        // time, so the target shrinks a little but stays in the same
        // order of magnitude.
        let old = bits_to_target(0x1d00ffff);
        let new = bits_to_target(bits);
        assert!(new <= old);
        assert!(new.clone() * BigUint::from(2u32) > old);
    }

    #[test]
    fn fast_blocks_tighten_target() {
        let blocks = window(15, 10, 0x1d00ffff);
        let bits = calc_next_bits(&blocks, 10, 60, MIN_BITS);
        assert!(bits_to_target(bits) < bits_to_target(0x1d00ffff));
    }

    #[test]
    fn slow_blocks_relax_target() {
        let blocks = window(180, 10, 0x1d00ffff);
        let bits = calc_next_bits(&blocks, 10, 60, MIN_BITS);
        assert!(bits_to_target(bits) > bits_to_target(0x1d00ffff));
    }

    #[test]
    fn adjustment_is_clamped_to_four_x() {
        // Instant blocks: actual time clamps to expected/4.
        let fast = window(0, 10, 0x1d00ffff);
        let fast_bits = calc_next_bits(&fast, 10, 60, MIN_BITS);
        let quarter = bits_to_target(0x1d00ffff) / BigUint::from(4u32);
        assert_eq!(bits_to_target(fast_bits), quarter);

        // Extremely slow blocks: actual time clamps to expected*4.
        let slow = window(100_000, 10, 0x1d00ffff);
        let slow_bits = calc_next_bits(&slow, 10, 60, MIN_BITS);
        let quadruple = bits_to_target(0x1d00ffff) * BigUint::from(4u32);
        assert_eq!(bits_to_target(slow_bits), quadruple);
    }

    #[test]
    fn retarget_never_exceeds_min_difficulty() {
        // Already at the easiest allowed target; slow blocks cannot
        // push it past min_bits.
        let blocks = window(100_000, 10, MIN_BITS);
        assert_eq!(calc_next_bits(&blocks, 10, 60, MIN_BITS), MIN_BITS);
    }

    #[test]
    fn floor_is_min_bits_in_first_epoch() {
        assert_eq!(progressive_floor(0, 1000, MIN_BITS), MIN_BITS);
        assert_eq!(progressive_floor(999, 1000, MIN_BITS), MIN_BITS);
    }

    #[test]
    fn floor_halves_target_each_epoch() {
        let epoch1 = progressive_floor(1000, 1000, MIN_BITS);
        let epoch2 = progressive_floor(2000, 1000, MIN_BITS);
        assert_eq!(
            bits_to_target(epoch1),
            bits_to_target(MIN_BITS) >> 1usize
        );
        assert_eq!(
            bits_to_target(epoch2),
            bits_to_target(MIN_BITS) >> 2usize
        );
    }

    #[test]
    fn floor_is_monotonically_tightening() {
        let mut prev = bits_to_target(progressive_floor(0, 1000, MIN_BITS));
        for height in (1000..=30_000).step_by(1000) {
            let cur = bits_to_target(progressive_floor(height, 1000, MIN_BITS));
            assert!(cur <= prev, "floor relaxed at height {height}");
            prev = cur;
        }
    }

    #[test]
    fn floor_epoch_count_is_capped() {
        let capped = progressive_floor(61_000, 1000, MIN_BITS);
        let beyond = progressive_floor(1_000_000, 1000, MIN_BITS);
        assert_eq!(capped, beyond);
        assert!(bits_to_target(capped).bits() > 0);
    }

    #[test]
    fn zero_epoch_blocks_disables_floor() {
        assert_eq!(progressive_floor(1_000_000, 0, MIN_BITS), MIN_BITS);
    }

    #[test]
    fn clamp_replaces_easier_bits() {
        // At epoch 1 the floor is half the min target; min_bits itself
        // is now too easy and must be replaced.
        let clamped = apply_progressive_floor(MIN_BITS, 1000, 1000, MIN_BITS);
        assert_eq!(clamped, progressive_floor(1000, 1000, MIN_BITS));
    }

    #[test]
    fn clamp_keeps_harder_bits() {
        let hard = 0x1a00ffff;
        assert_eq!(apply_progressive_floor(hard, 1000, 1000, MIN_BITS), hard);
    }
}
