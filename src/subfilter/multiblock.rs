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

/// Subfilter that sets one bit in each element of a `[B; K]` array.
///
/// Splitting the `K` bits over `K` disjoint words ("split block") lowers
/// the false positive rate compared with [`Block`](super::Block) at the
/// same bits per element, at the cost of touching a wider span of the
/// bucket.
///
/// # Examples
///
/// ```
/// use blockbloom::subfilter::{Multiblock, Subfilter};
///
/// let mut cell = [0u32; 5];
/// Multiblock::<u32, 5>::mark(&mut cell, 0x0123_4567_89AB_CDEF);
/// assert!(Multiblock::<u32, 5>::check(&cell, 0x0123_4567_89AB_CDEF));
/// ```
pub struct Multiblock<B, const K: usize>(PhantomData<B>);

impl<B: BlockWord, const K: usize> Subfilter for Multiblock<B, K> {
    type Value = [B; K];

    const K: usize = {
        assert!(K >= 1, "Multiblock requires K >= 1");
        K
    };

    #[inline(always)]
    fn mark(x: &mut [B; K], hash: u64) {
        each_index::<B>(K, hash, |i, idx| x[i].set_bit(idx));
    }

    #[inline(always)]
    fn check(x: &[B; K], hash: u64) -> bool {
        // Branchless accumulation over all K lanes, as the marking order
        // is identical.
        let mut res = true;
        each_index::<B>(K, hash, |i, idx| res &= x[i].test_bit(idx));
        res
    }

    fn fpr(i: usize, w: usize) -> f64 {
        // w covers the whole block: K lanes of w/K bits, one bit set per
        // lane per element.
        let lane = w as f64 / K as f64;
        let one_lane_hit = 1.0 - (1.0 - 1.0 / lane).powi(i as i32);
        one_lane_hit.powi(K as i32)
    }
}
