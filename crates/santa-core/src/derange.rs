//! derangement generator
//!
//! deterministic fixed-point-free permutation of `[0, n)` from a u32 seed.
//! auditors re-run this on the decrypted seed to check on-chain assignments,
//! so the exact prng and swap order below are part of the protocol:
//!
//! 1. 64-bit lcg seeded with `seed ^ LCG_SALT`, advanced once
//! 2. fisher-yates from the back, `j = (next >> 33) % (i + 1)`
//! 3. one left-to-right pass swapping every fixed point with its right
//!    neighbour (cyclically)

use crate::error::{Result, SantaError};

/// fewer players than this cannot form a meaningful exchange
pub const MIN_PLAYERS: usize = 3;

const LCG_MUL: u64 = 6364136223846793005;
const LCG_INC: u64 = 1442695040888963407;
const LCG_SALT: u64 = 0x5851_f42d_4c95_7f2d;

/// seeded lcg prng
#[derive(Clone, Debug)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u32) -> Self {
        let mut lcg = Self {
            state: seed as u64 ^ LCG_SALT,
        };
        lcg.next();
        lcg
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
        self.state
    }

    /// value in `[0, bound)` from the high bits
    fn below(&mut self, bound: usize) -> usize {
        ((self.next() >> 33) % bound as u64) as usize
    }
}

/// assignment for `n` participants: participant `i` gifts `p[i]`
pub fn derange(seed: u32, n: usize) -> Result<Vec<usize>> {
    if n < MIN_PLAYERS {
        return Err(SantaError::InvalidParticipantCount { n });
    }

    let mut rng = Lcg::new(seed);
    let mut perm: Vec<usize> = (0..n).collect();

    // fisher-yates shuffle
    for i in (1..n).rev() {
        let j = rng.below(i + 1);
        perm.swap(i, j);
    }

    // swapping p[i] == i with any other slot k leaves both non-fixed:
    // p[k] != i because p is a permutation
    for i in 0..n {
        if perm[i] == i {
            perm.swap(i, (i + 1) % n);
        }
    }

    debug_assert!(is_derangement(&perm));
    Ok(perm)
}

/// bijective over `[0, len)` with no fixed points
pub fn is_derangement(perm: &[usize]) -> bool {
    let n = perm.len();
    let mut seen = vec![false; n];
    for (i, &target) in perm.iter().enumerate() {
        if target >= n || target == i || seen[target] {
            return false;
        }
        seen[target] = true;
    }
    true
}

/// re-derive from `seed` and compare with observed assignments
pub fn verify_assignment(seed: u32, assignments: &[usize]) -> Result<bool> {
    Ok(derange(seed, assignments.len())? == assignments)
}

/// inverse view: for each participant, who gifts them
pub fn givers(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (giver, &target) in perm.iter().enumerate() {
        inv[target] = giver;
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_rejects_small_games() {
        for n in 0..3 {
            assert_eq!(derange(7, n), Err(SantaError::InvalidParticipantCount { n }));
        }
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(derange(42, 5).unwrap(), vec![1, 4, 3, 2, 0]);
        assert_eq!(derange(0, 3).unwrap(), vec![1, 2, 0]);
        assert_eq!(derange(1, 3).unwrap(), vec![2, 0, 1]);
        assert_eq!(derange(u32::MAX, 8).unwrap(), vec![1, 4, 0, 2, 7, 3, 5, 6]);
    }

    #[test]
    fn test_three_players_reach_both_cycles() {
        let seen: HashSet<Vec<usize>> = (0..64).map(|s| derange(s, 3).unwrap()).collect();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&vec![1, 2, 0]));
        assert!(seen.contains(&vec![2, 0, 1]));
    }

    #[test]
    fn test_is_derangement() {
        assert!(is_derangement(&[1, 2, 0]));
        assert!(!is_derangement(&[0, 2, 1]));
        assert!(!is_derangement(&[1, 1, 0]));
        assert!(!is_derangement(&[1, 3, 0]));
    }

    #[test]
    fn test_verify_assignment() {
        let perm = derange(99, 6).unwrap();
        assert!(verify_assignment(99, &perm).unwrap());
        let mut tampered = perm.clone();
        tampered.rotate_left(1);
        assert!(!verify_assignment(99, &tampered).unwrap());
        assert!(verify_assignment(99, &[1, 0]).is_err());
    }

    #[test]
    fn test_givers_inverts() {
        let perm = derange(5, 7).unwrap();
        let inv = givers(&perm);
        for (giver, &target) in perm.iter().enumerate() {
            assert_eq!(inv[target], giver);
        }
    }

    proptest! {
        #[test]
        fn prop_always_derangement(seed in any::<u32>(), n in 3usize..200) {
            let perm = derange(seed, n).unwrap();
            prop_assert_eq!(perm.len(), n);
            prop_assert!(is_derangement(&perm));
        }

        #[test]
        fn prop_deterministic(seed in any::<u32>(), n in 3usize..64) {
            prop_assert_eq!(derange(seed, n).unwrap(), derange(seed, n).unwrap());
        }
    }
}
