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

//! SIMD split-block subfilter over eight 32-bit lanes.
//!
//! Statistically equivalent to `Multiblock<u32, K>`: one bit per 32-bit
//! lane, `K` lanes used. The AVX2 path derives all eight lane positions
//! from one hash with a single vector multiply against the rehash
//! constants published with Apache Kudu's block Bloom filter. Without
//! AVX2 the type is an alias for the scalar strategy; the two layouts
//! are not byte-compatible, so serialized filters must agree on the
//! build-time selection.

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub use self::avx2::FastMultiblock32;

#[cfg(not(all(target_arch = "x86_64", target_feature = "avx2")))]
pub type FastMultiblock32<const K: usize> = super::Multiblock<u32, K>;

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
mod avx2 {
    use core::arch::x86_64::__m256i;
    use core::arch::x86_64::_mm256_mullo_epi32;
    use core::arch::x86_64::_mm256_or_si256;
    use core::arch::x86_64::_mm256_set1_epi64x;
    use core::arch::x86_64::_mm256_set_epi32;
    use core::arch::x86_64::_mm256_set_epi64x;
    use core::arch::x86_64::_mm256_sllv_epi32;
    use core::arch::x86_64::_mm256_srli_epi32;
    use core::arch::x86_64::_mm256_testc_si256;

    use crate::subfilter::Subfilter;

    /// AVX2 subfilter setting one bit in each of `K` 32-bit lanes of a
    /// 256-bit block. Only the first `4 * K` bytes of the block are
    /// meaningful; the engine sizes buckets accordingly.
    pub struct FastMultiblock32<const K: usize>;

    impl<const K: usize> Subfilter for FastMultiblock32<K> {
        type Value = __m256i;

        const K: usize = {
            assert!(K >= 1 && K <= 8, "FastMultiblock32 requires 1 <= K <= 8");
            K
        };

        const USED_VALUE_SIZE: usize = 4 * K;

        #[inline(always)]
        fn mark(x: &mut __m256i, hash: u64) {
            unsafe {
                *x = _mm256_or_si256(*x, make::<K>(hash));
            }
        }

        #[inline(always)]
        fn check(x: &__m256i, hash: u64) -> bool {
            unsafe {
                let h = make::<K>(hash);
                if K == 8 {
                    _mm256_testc_si256(*x, h) != 0
                } else {
                    // Force the unused high lanes to satisfy the test.
                    let y = _mm256_or_si256(unused_lane_mask::<K>(), *x);
                    _mm256_testc_si256(y, h) != 0
                }
            }
        }

        fn fpr(i: usize, w: usize) -> f64 {
            let lane = w as f64 / K as f64;
            let one_lane_hit = 1.0 - (1.0 - 1.0 / lane).powi(i as i32);
            one_lane_hit.powi(K as i32)
        }
    }

    /// Mask of single set bits: lane `j < K` holds `1 << pos_j`, lanes
    /// `j >= K` are zero.
    #[inline(always)]
    unsafe fn make<const K: usize>(hash: u64) -> __m256i {
        let ones = [
            _mm256_set_epi32(0, 0, 0, 0, 0, 0, 0, 1),
            _mm256_set_epi32(0, 0, 0, 0, 0, 0, 1, 1),
            _mm256_set_epi32(0, 0, 0, 0, 0, 1, 1, 1),
            _mm256_set_epi32(0, 0, 0, 0, 1, 1, 1, 1),
            _mm256_set_epi32(0, 0, 0, 1, 1, 1, 1, 1),
            _mm256_set_epi32(0, 0, 1, 1, 1, 1, 1, 1),
            _mm256_set_epi32(0, 1, 1, 1, 1, 1, 1, 1),
            _mm256_set_epi32(1, 1, 1, 1, 1, 1, 1, 1),
        ];

        // Same constants as src/kudu/util/block_bloom_filter.h in
        // https://github.com/apache/kudu
        let rehash = _mm256_set_epi64x(
            0x47b6137b44974d91u64 as i64,
            0x8824ad5ba2b7289du64 as i64,
            0x705495c72df1424bu64 as i64,
            0x9efc49475c6bfb31u64 as i64,
        );

        let h = _mm256_set1_epi64x(hash as i64);
        let h = _mm256_mullo_epi32(rehash, h);
        let h = _mm256_srli_epi32::<{ 32 - 5 }>(h);
        _mm256_sllv_epi32(ones[K - 1], h)
    }

    /// All-ones in the lanes above `K`; the identity mask when every
    /// lane is in use.
    #[inline(always)]
    unsafe fn unused_lane_mask<const K: usize>() -> __m256i {
        let mask = [
            _mm256_set_epi32(-1, -1, -1, -1, -1, -1, -1, 0),
            _mm256_set_epi32(-1, -1, -1, -1, -1, -1, 0, 0),
            _mm256_set_epi32(-1, -1, -1, -1, -1, 0, 0, 0),
            _mm256_set_epi32(-1, -1, -1, -1, 0, 0, 0, 0),
            _mm256_set_epi32(-1, -1, -1, 0, 0, 0, 0, 0),
            _mm256_set_epi32(-1, -1, 0, 0, 0, 0, 0, 0),
            _mm256_set_epi32(-1, 0, 0, 0, 0, 0, 0, 0),
            _mm256_set_epi32(0, 0, 0, 0, 0, 0, 0, 0),
        ];
        mask[K - 1]
    }

    #[cfg(test)]
    mod tests {
        use core::arch::x86_64::_mm256_setzero_si256;

        use super::*;

        fn lanes(x: __m256i) -> [u32; 8] {
            unsafe { std::mem::transmute(x) }
        }

        #[test]
        fn test_mark_sets_one_bit_in_used_lanes_only() {
            for seed in 1u64..100 {
                let hash = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
                let mut x = unsafe { _mm256_setzero_si256() };
                FastMultiblock32::<5>::mark(&mut x, hash);
                let lanes = lanes(x);
                for lane in &lanes[..5] {
                    assert_eq!(lane.count_ones(), 1);
                }
                for lane in &lanes[5..] {
                    assert_eq!(*lane, 0);
                }
            }
        }

        #[test]
        fn test_check_after_mark() {
            for seed in 1u64..100 {
                let hash = seed.wrapping_mul(0x0123_4567_89AB_CDEF) | 1;
                let mut x = unsafe { _mm256_setzero_si256() };
                FastMultiblock32::<8>::mark(&mut x, hash);
                assert!(FastMultiblock32::<8>::check(&x, hash));

                let mut y = unsafe { _mm256_setzero_si256() };
                FastMultiblock32::<3>::mark(&mut y, hash);
                assert!(FastMultiblock32::<3>::check(&y, hash));
            }
        }

        #[test]
        fn test_check_on_empty_block_fails() {
            let zero = unsafe { _mm256_setzero_si256() };
            assert!(!FastMultiblock32::<8>::check(&zero, u64::MAX));
            assert!(!FastMultiblock32::<1>::check(&zero, u64::MAX));
        }
    }
}
