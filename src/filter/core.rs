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

//! Hash-level filter engine: bucket selection, storage and the K-round
//! insert/lookup loops. The public facade in the parent module maps
//! elements to 64-bit hashes and forwards here.

use std::alloc;
use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::ptr::NonNull;
use std::slice;

use super::fpr::FprModel;
use crate::error::Error;
use crate::mulx::umul128;
use crate::subfilter::Subfilter;

/// Distance covered by one prefetch instruction. Hard to know at
/// compile time; 64 bytes is right for effectively every current
/// mainstream core.
pub const CACHE_LINE_SIZE: usize = 64;

/// Produces `(pos, hash')` from a 64-bit hash:
///
/// - `(lo, hi) = umul128(hash, rng)`
/// - `pos = hi`, uniform in `[0, rng)` (fast-range)
/// - `hash' = lo`, a multiplicative congruential step mod 2^64
///
/// The MCG generates long cycles when the initial hash is odd and
/// `rng = +-3 (mod 8)`, which is why both are adjusted. As a result the
/// low bits of `hash'` are of poor quality and the least significant
/// bit in particular is always one; consumers must take index bits from
/// the high end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct McgFastRange {
    rng: u64,
}

impl McgFastRange {
    pub(crate) fn new(m: usize) -> Self {
        let m = m as u64;
        let r = m % 8;
        let rng = m + if r <= 3 {
            3 - r
        } else if r <= 5 {
            5 - r
        } else {
            8 - r + 3
        };
        McgFastRange { rng }
    }

    #[inline(always)]
    pub(crate) fn range(&self) -> usize {
        self.rng as usize
    }

    #[inline(always)]
    pub(crate) fn prepare_hash(&self, hash: &mut u64) {
        *hash |= 1;
    }

    #[inline(always)]
    pub(crate) fn next_position(&self, hash: &mut u64) -> usize {
        let (lo, hi) = umul128(*hash, self.rng);
        *hash = lo;
        hi as usize
    }
}

/// GCD for x, p > 1 with p a power of two. `x & x.wrapping_neg()` is
/// the maximum power of two dividing x.
const fn gcd_pow2(x: usize, p: usize) -> usize {
    let low = x & x.wrapping_neg();
    if low < p {
        low
    } else {
        p
    }
}

/// Shared storage behind every zero-capacity filter. Reads of any
/// in-range block come back all-ones, so `check` passes and
/// `may_contain` degenerates to `true` without a branch; writes are
/// gated by a null test on [`FilterArray::data`].
const SENTINEL_SIZE: usize = 1024;

#[repr(align(64))]
struct Sentinel([u8; SENTINEL_SIZE]);

static SENTINEL: Sentinel = Sentinel([u8::MAX; SENTINEL_SIZE]);

struct FilterArray {
    /// Owning pointer; null for zero-capacity filters.
    data: *mut u8,
    /// Base of bucket zero: `data` when allocated, the all-ones
    /// sentinel otherwise.
    buckets: NonNull<u8>,
}

#[inline(always)]
fn prefetch_read(p: *const u8) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        use core::arch::x86_64::_mm_prefetch;
        use core::arch::x86_64::_MM_HINT_T0;
        _mm_prefetch::<_MM_HINT_T0>(p as *const i8);
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = p;
}

#[inline(always)]
fn prefetch_write(p: *const u8) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        use core::arch::x86_64::_mm_prefetch;
        use core::arch::x86_64::_MM_HINT_T0;
        _mm_prefetch::<_MM_HINT_T0>(p as *const i8);
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = p;
}

/// Engine common to all filter instantiations. Works purely on 64-bit
/// hashes; `K` subfilter invocations per element, each against the
/// bucket selected by one [`McgFastRange`] step.
pub(crate) struct FilterCore<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> {
    hs: McgFastRange,
    ar: FilterArray,
    _strategy: PhantomData<S>,
}

// The array is exclusively owned (or the immutable sentinel) and the
// strategy is stateless, so the usual container rules apply.
unsafe impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> Send
    for FilterCore<K, S, BUCKET_STRIDE>
{
}
unsafe impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> Sync
    for FilterCore<K, S, BUCKET_STRIDE>
{
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> FilterCore<K, S, BUCKET_STRIDE> {
    const BLOCK_SIZE: usize = std::mem::size_of::<S::Value>();
    const BLOCK_ALIGN: usize = std::mem::align_of::<S::Value>();
    const USED_BLOCK_SIZE: usize = S::USED_VALUE_SIZE;

    /// Distance in bytes between consecutive bucket bases.
    pub(crate) const BUCKET_SIZE: usize = if BUCKET_STRIDE == 0 {
        S::USED_VALUE_SIZE
    } else {
        BUCKET_STRIDE
    };

    /// Headroom past the last bucket base so every bucket can read and
    /// write a full block.
    const TAIL_SIZE: usize = Self::BLOCK_SIZE - Self::BUCKET_SIZE;

    const ARE_BLOCKS_ALIGNED: bool = Self::BUCKET_SIZE % Self::BLOCK_ALIGN == 0;

    const INITIAL_ALIGNMENT: usize = if Self::ARE_BLOCKS_ALIGNED {
        if Self::BLOCK_ALIGN > CACHE_LINE_SIZE {
            Self::BLOCK_ALIGN
        } else {
            CACHE_LINE_SIZE
        }
    } else {
        1
    };

    const PREFETCHED_CACHELINES: usize = 1
        + (Self::BLOCK_SIZE + CACHE_LINE_SIZE - 1 - gcd_pow2(Self::BUCKET_SIZE, CACHE_LINE_SIZE))
            / CACHE_LINE_SIZE;

    /// Widest speculative read an empty filter can issue: positions 0-2
    /// over the sentinel, one full block at the last one.
    const SPECULATIVE_SPAN: usize = 2 * Self::BUCKET_SIZE + Self::BLOCK_SIZE;

    /// Monomorphization-time parameter validation. Evaluating `S::K`
    /// also triggers the subfilter's own bounds assertions.
    const CHECKS: () = {
        assert!(K >= 1, "filter requires K >= 1");
        assert!(S::K >= 1, "subfilter must set at least one bit");
        assert!(
            Self::BUCKET_SIZE <= Self::USED_BLOCK_SIZE,
            "BucketStride can't exceed the used block size"
        );
        assert!(
            Self::SPECULATIVE_SPAN <= SENTINEL_SIZE,
            "block type too large for the shared empty-filter storage"
        );
    };

    const FPR_MODEL: FprModel = FprModel {
        k: K,
        k_total: K * S::K,
        w_bits: (2 * Self::USED_BLOCK_SIZE - Self::BUCKET_SIZE) * 8,
        cell_fpr: S::fpr,
    };

    pub(crate) fn new(m: usize) -> Self {
        let () = Self::CHECKS;
        let hs = McgFastRange::new(Self::requested_range(m));
        let ar = Self::new_array(if m != 0 { hs.range() } else { 0 });
        FilterCore {
            hs,
            ar,
            _strategy: PhantomData,
        }
    }

    pub(crate) fn with_accuracy(n: usize, fpr: f64) -> Self {
        Self::new(Self::FPR_MODEL.unadjusted_capacity_for(n, fpr))
    }

    /// Capacity in bits. A multiple of 8 by construction; zero iff the
    /// filter was built with `m == 0`.
    pub(crate) fn capacity(&self) -> usize {
        Self::used_array_size(self.range()) * 8
    }

    /// Capacity actually obtained when asking for `n` elements at the
    /// given false positive rate.
    pub(crate) fn capacity_for(n: usize, fpr: f64) -> usize {
        let () = Self::CHECKS;
        let m = Self::FPR_MODEL.unadjusted_capacity_for(n, fpr);
        if m == 0 {
            return 0;
        }
        let rng = McgFastRange::new(Self::requested_range(m)).range();
        Self::used_array_size(rng) * 8
    }

    pub(crate) fn fpr_for(n: usize, m: usize) -> f64 {
        let () = Self::CHECKS;
        Self::FPR_MODEL.fpr_for(n, m)
    }

    #[inline(always)]
    pub(crate) fn insert(&mut self, mut hash: u64) {
        self.hs.prepare_hash(&mut hash);
        let p = self.next_element_write(&mut hash);
        // The unhappy-path null check sits after the first prefetch
        // issue rather than at the top of the function: the prefetch
        // completion wait gives us free cycles to absorb the branch.
        if self.ar.data.is_null() {
            return;
        }
        unsafe { Self::set(p, hash) };
        for _ in 1..K {
            let p = self.next_element_write(&mut hash);
            unsafe { Self::set(p, hash) };
        }
    }

    #[inline(always)]
    pub(crate) fn may_contain(&self, mut hash: u64) -> bool {
        self.hs.prepare_hash(&mut hash);
        // Software-pipelined: issue the next round's prefetch before
        // testing the current block.
        let mut p0 = self.next_element_read(&mut hash);
        for _ in 1..K {
            let p = p0;
            let hash0 = hash;
            p0 = self.next_element_read(&mut hash);
            if !unsafe { Self::get(p, hash0) } {
                return false;
            }
        }
        unsafe { Self::get(p0, hash) }
    }

    /// Zeroes the used byte range; capacity is unchanged.
    pub(crate) fn clear(&mut self) {
        let n = Self::used_array_size(self.range());
        if n != 0 {
            unsafe { ptr::write_bytes(self.ar.buckets.as_ptr(), 0, n) };
        }
    }

    /// Clears the filter, reshaping it to capacity `m` first if that
    /// changes the bucket count. The old array is kept when the shape
    /// is unchanged.
    pub(crate) fn reset(&mut self, m: usize) {
        let new_hs = McgFastRange::new(Self::requested_range(m));
        let rng = if m != 0 { new_hs.range() } else { 0 };
        if rng != self.range() {
            let new_ar = Self::new_array(rng);
            self.release();
            self.hs = new_hs;
            self.ar = new_ar;
        }
        self.clear();
    }

    pub(crate) fn combine_and(&mut self, x: &Self) -> Result<(), Error> {
        self.combine(x, |a, b| *a &= b)
    }

    pub(crate) fn combine_or(&mut self, x: &Self) -> Result<(), Error> {
        self.combine(x, |a, b| *a |= b)
    }

    /// Byte view of the used array range; empty for zero capacity.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        let n = Self::used_array_size(self.range());
        unsafe { slice::from_raw_parts(self.ar.buckets.as_ptr(), n) }
    }

    /// Mutable byte view of the used array range.
    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        let n = Self::used_array_size(self.range());
        if n == 0 {
            return &mut [];
        }
        unsafe { slice::from_raw_parts_mut(self.ar.buckets.as_ptr(), n) }
    }

    fn range(&self) -> usize {
        if self.ar.data.is_null() {
            0
        } else {
            self.hs.range()
        }
    }

    /// Buckets needed to hold `m` bits, with the tail headroom folded
    /// out first so that `FilterCore::new(f.capacity())` reproduces
    /// `f.capacity()` exactly.
    fn requested_range(mut m: usize) -> usize {
        let headroom = (Self::USED_BLOCK_SIZE - Self::BUCKET_SIZE) * 8;
        if m > headroom {
            m -= headroom;
        }
        let bucket_bits = Self::BUCKET_SIZE * 8;
        if usize::MAX - m >= bucket_bits - 1 {
            (m + bucket_bits - 1) / bucket_bits
        } else {
            m / bucket_bits
        }
    }

    fn used_array_size(rng: usize) -> usize {
        if rng != 0 {
            rng * Self::BUCKET_SIZE + (Self::USED_BLOCK_SIZE - Self::BUCKET_SIZE)
        } else {
            0
        }
    }

    fn layout_for(rng: usize) -> Layout {
        let size = rng * Self::BUCKET_SIZE + Self::TAIL_SIZE;
        match Layout::from_size_align(size, Self::INITIAL_ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => panic!("filter capacity overflows the address space"),
        }
    }

    fn new_array(rng: usize) -> FilterArray {
        if rng != 0 {
            let layout = Self::layout_for(rng);
            let p = unsafe { alloc::alloc_zeroed(layout) };
            let Some(buckets) = NonNull::new(p) else {
                alloc::handle_alloc_error(layout);
            };
            FilterArray { data: p, buckets }
        } else {
            FilterArray {
                data: ptr::null_mut(),
                buckets: NonNull::from(&SENTINEL.0).cast(),
            }
        }
    }

    fn release(&mut self) {
        if !self.ar.data.is_null() {
            unsafe { alloc::dealloc(self.ar.data, Self::layout_for(self.hs.range())) };
            self.ar.data = ptr::null_mut();
        }
    }

    #[inline(always)]
    fn bucket_at(&self, hash: &mut u64) -> *mut u8 {
        let pos = self.hs.next_position(hash);
        unsafe { self.ar.buckets.as_ptr().add(pos * Self::BUCKET_SIZE) }
    }

    #[inline(always)]
    fn next_element_write(&self, hash: &mut u64) -> *mut u8 {
        let p = self.bucket_at(hash);
        let mut i = 0;
        while i < Self::PREFETCHED_CACHELINES {
            prefetch_write(p.wrapping_add(i * CACHE_LINE_SIZE));
            i += 1;
        }
        p
    }

    #[inline(always)]
    fn next_element_read(&self, hash: &mut u64) -> *const u8 {
        let p = self.bucket_at(hash);
        let mut i = 0;
        while i < Self::PREFETCHED_CACHELINES {
            prefetch_read(p.wrapping_add(i * CACHE_LINE_SIZE));
            i += 1;
        }
        p
    }

    #[inline(always)]
    unsafe fn set(p: *mut u8, hash: u64) {
        if Self::ARE_BLOCKS_ALIGNED {
            S::mark(&mut *(p as *mut S::Value), hash);
        } else {
            let mut x = ptr::read_unaligned(p as *const S::Value);
            S::mark(&mut x, hash);
            ptr::write_unaligned(p as *mut S::Value, x);
        }
    }

    #[inline(always)]
    unsafe fn get(p: *const u8, hash: u64) -> bool {
        if Self::ARE_BLOCKS_ALIGNED {
            S::check(&*(p as *const S::Value), hash)
        } else {
            let x = ptr::read_unaligned(p as *const S::Value);
            S::check(&x, hash)
        }
    }

    fn combine(&mut self, x: &Self, f: impl Fn(&mut u8, u8)) -> Result<(), Error> {
        if self.range() != x.range() {
            return Err(Error::incompatible_capacity(self.capacity(), x.capacity()));
        }
        let n = Self::used_array_size(self.range());
        if n != 0 {
            let dst = unsafe { slice::from_raw_parts_mut(self.ar.buckets.as_ptr(), n) };
            let src = unsafe { slice::from_raw_parts(x.ar.buckets.as_ptr(), n) };
            for (a, b) in dst.iter_mut().zip(src) {
                f(a, *b);
            }
        }
        Ok(())
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> Drop
    for FilterCore<K, S, BUCKET_STRIDE>
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> Default
    for FilterCore<K, S, BUCKET_STRIDE>
{
    fn default() -> Self {
        Self::new(0)
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> Clone
    for FilterCore<K, S, BUCKET_STRIDE>
{
    fn clone(&self) -> Self {
        let ar = Self::new_array(self.range());
        let mut cloned = FilterCore {
            hs: self.hs,
            ar,
            _strategy: PhantomData,
        };
        cloned.as_bytes_mut().copy_from_slice(self.as_bytes());
        cloned
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> PartialEq
    for FilterCore<K, S, BUCKET_STRIDE>
{
    fn eq(&self, other: &Self) -> bool {
        if self.range() != other.range() {
            return false;
        }
        if self.ar.data.is_null() {
            return true;
        }
        self.as_bytes() == other.as_bytes()
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> Eq
    for FilterCore<K, S, BUCKET_STRIDE>
{
}

impl<const K: usize, S: Subfilter, const BUCKET_STRIDE: usize> fmt::Debug
    for FilterCore<K, S, BUCKET_STRIDE>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCore")
            .field("capacity", &self.capacity())
            .field("buckets", &self.range())
            .finish()
    }
}
