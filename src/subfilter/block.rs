// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::marker::PhantomData;

use super::each_index;
use super::BlockWord;
use super::Subfilter;

/// Subfilter that sets `K` bits in a single integer of type `B`.
///
/// The classical blocked-Bloom strategy: one bucket is one word, all `K`
/// bits land in it. Checking builds the same fingerprint mask into an
/// empty word and compares it against the stored one.
///
/// # Examples
///
/// ```
/// use blockbloom::subfilter::{Block, Subfilter};
///
/// let mut cell = 0u64;
/// Block::<u64, 4>::mark(&mut cell, 0xDEAD_BEEF_DEAD_BEEF);
/// assert!(Block::<u64, 4>::check(&cell, 0xDEAD_BEEF_DEAD_BEEF));
/// assert!(!Block::<u64, 4>::check(&0u64, 0xDEAD_BEEF_DEAD_BEEF));
/// ```
pub struct Block<B, const K: usize>(PhantomData<B>);

impl<B: BlockWord, const K: usize> Subfilter for Block<B, K> {
    type Value = B;

    const K: usize = {
        assert!(K >= 1, "Block requires K >= 1");
        K
    };

    #[inline(always)]
    fn mark(x: &mut B, hash: u64) {
        each_index::<B>(K, hash, |_, idx| x.set_bit(idx));
    }

    #[inline(always)]
    fn check(x: &B, hash: u64) -> bool {
        let mut fp = B::ZERO;
        Self::mark(&mut fp, hash);
        x.contains_all(fp)
    }

    fn fpr(i: usize, w: usize) -> f64 {
        // i elements have set i*K bits uniformly in a w-bit cell; a probe
        // passes when its K positions are all occupied.
        let w = w as f64;
        let one_bit_set = 1.0 - (1.0 - 1.0 / w).powi((i * K) as i32);
        one_bit_set.powi(K as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_sets_at_most_k_bits() {
        for seed in 1u64..200 {
            let hash = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
            let mut x = 0u64;
            Block::<u64, 4>::mark(&mut x, hash);
            let ones = x.count_ones() as usize;
            assert!(ones >= 1 && ones <= 4, "got {ones} bits for hash {hash:#x}");
        }
    }

    #[test]
    fn test_check_after_mark() {
        for seed in 1u64..200 {
            let hash = seed.wrapping_mul(0x0123_4567_89AB_CDEF) | 1;
            let mut x = 0u16;
            Block::<u16, 3>::mark(&mut x, hash);
            assert!(Block::<u16, 3>::check(&x, hash));
        }
    }

    #[test]
    fn test_check_on_empty_block_fails() {
        assert!(!Block::<u8, 1>::check(&0u8, 0x1234_5678_9ABC_DEF1));
        assert!(!Block::<u64, 8>::check(&0u64, 0x1234_5678_9ABC_DEF1));
    }

    #[test]
    fn test_fpr_monotone_in_occupancy() {
        let mut prev = 0.0;
        for i in 0..64 {
            let p = Block::<u64, 4>::fpr(i, 64);
            assert!(p >= prev);
            assert!(p <= 1.0);
            prev = p;
        }
        assert_eq!(Block::<u64, 4>::fpr(0, 64), 0.0);
    }
}
