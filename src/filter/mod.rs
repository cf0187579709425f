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

//! Configurable blocked Bloom filter.
//!
//! A [`Filter`] maps each inserted element, via hashing, to a fixed
//! number of bit positions that are set to one; a later lookup reports
//! `true` iff all of those positions are set. Membership answers are
//! one-sided: no false negatives, a tunable false positive rate.
//!
//! # Properties
//!
//! - **No false negatives**: an inserted element always reports
//!   [`may_contain`](Filter::may_contain) `== true`
//! - **Possible false positives**: unseen elements may report `true`
//! - **Fixed shape**: only [`reset`](Filter::reset) reshapes a filter,
//!   discarding its contents
//! - **Cache-aware**: each of the `K` rounds per element touches one
//!   bucket, prefetched a cache line at a time
//!
//! # Usage
//!
//! ```rust
//! use blockbloom::Filter;
//! use blockbloom::subfilter::Multiblock;
//!
//! // One round per element, eight bits spread over a 64-byte block,
//! // sized for 10_000 elements at 0.5% false positives.
//! let mut filter: Filter<u64, 1, Multiblock<u64, 8>> =
//!     Filter::with_accuracy(10_000, 0.005);
//!
//! filter.insert(&42);
//! filter.insert(&7);
//!
//! assert!(filter.may_contain(&42)); // definitely inserted
//! assert!(filter.may_contain(&7));
//! ```
//!
//! # Configuration
//!
//! The filter is configured at the type level:
//!
//! - `K`: rounds of subfilter invocation per element.
//! - `S`: the [`Subfilter`] strategy — [`Block`](crate::subfilter::Block)
//!   (all bits in one word), [`Multiblock`](crate::subfilter::Multiblock)
//!   (one bit per word of an array), or
//!   [`FastMultiblock32`](crate::subfilter::FastMultiblock32) (SIMD).
//! - `BUCKET_STRIDE`: byte distance between consecutive bucket bases.
//!   `0` means the used block size (buckets tile the array); smaller
//!   values overlap buckets, lowering the false positive rate at the
//!   cost of unaligned block access.
//! - `H`: the hash policy binding a [`BuildHasher`] to the filter, see
//!   [`FilterHash`].
//!
//! Two filters interoperate (combine, serialized exchange) only when
//! these type parameters agree; the parameters themselves are never
//! part of the serial format.
//!
//! # Sharing
//!
//! A filter behaves like any sequential container: any number of
//! threads may query through `&Filter`, writers need `&mut Filter`,
//! and the borrow rules enforce exactly that split. There is no
//! internal synchronization.
//!
//! # Hash mixing
//!
//! The engine needs all 64 hash bits to spread well: bucket selection
//! multiplies the full word and the subfilters slice index bits off it.
//! [`Mixed`] wraps any [`BuildHasher`] and applies a strong avalanche
//! step to its output; [`Avalanching`] declares that the wrapped hasher
//! already avalanches and passes its output through unchanged. The
//! default policy runs the crate's XXH64 unmixed.

mod core;
mod fpr;

pub use self::core::CACHE_LINE_SIZE;

use std::hash::BuildHasher;
use std::hash::BuildHasherDefault;
use std::hash::Hash;
use std::marker::PhantomData;

use self::core::FilterCore;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::error::Error;
use crate::hash::XxHash64;
use crate::mulx::mulx64_mix;
use crate::subfilter::Block;
use crate::subfilter::Subfilter;

/// Maps an element to the 64-bit hash the filter engine consumes.
///
/// Implemented by the two mixing policies, [`Mixed`] and
/// [`Avalanching`]. The policy is part of the filter type; two filters
/// only interoperate when they hash identically.
pub trait FilterHash {
    fn hash64<T: Hash + ?Sized>(&self, x: &T) -> u64;
}

/// Hash policy for hashers of unknown or sub-64-bit quality: the
/// hasher's output is post-mixed with a strong avalanche step so that
/// clustered hashes cannot cluster bucket positions.
#[derive(Clone, Debug, Default)]
pub struct Mixed<H>(pub H);

impl<H: BuildHasher> FilterHash for Mixed<H> {
    #[inline(always)]
    fn hash64<T: Hash + ?Sized>(&self, x: &T) -> u64 {
        mulx64_mix(self.0.hash_one(x))
    }
}

/// Hash policy asserting that the wrapped hasher already avalanches
/// over all 64 output bits; its hashes are consumed unmixed.
#[derive(Clone, Debug, Default)]
pub struct Avalanching<H>(pub H);

impl<H: BuildHasher> FilterHash for Avalanching<H> {
    #[inline(always)]
    fn hash64<T: Hash + ?Sized>(&self, x: &T) -> u64 {
        self.0.hash_one(x)
    }
}

/// The default hash policy: XXH64, which avalanches.
pub type DefaultFilterHash = Avalanching<BuildHasherDefault<XxHash64>>;

/// Approximate-membership filter over elements of type `T`.
///
/// See the [module documentation](self) for the configuration space.
pub struct Filter<
    T,
    const K: usize,
    S: Subfilter = Block<u8, 1>,
    const BUCKET_STRIDE: usize = 0,
    H: FilterHash = DefaultFilterHash,
> {
    core: FilterCore<K, S, BUCKET_STRIDE>,
    hasher: H,
    _elem: PhantomData<fn(&T)>,
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> Filter<T, K, S, BUCKET_STRIDE, H>
where
    T: Hash,
    S: Subfilter,
    H: FilterHash,
{
    /// Creates a filter with capacity of at least `m` bits, all zero.
    /// `m == 0` yields a zero-capacity filter that allocates nothing.
    pub fn new(m: usize) -> Self
    where
        H: Default,
    {
        Self::with_hasher(m, H::default())
    }

    /// Creates a filter with at least `m` bits and the given hash
    /// policy instance.
    pub fn with_hasher(m: usize, hasher: H) -> Self {
        Filter {
            core: FilterCore::new(m),
            hasher,
            _elem: PhantomData,
        }
    }

    /// Creates a filter sized for `n` elements at false positive rate
    /// `fpr`, so that `capacity() == capacity_for(n, fpr)`.
    ///
    /// # Panics
    ///
    /// Panics if `fpr` is outside `[0.0, 1.0]`.
    pub fn with_accuracy(n: usize, fpr: f64) -> Self
    where
        H: Default,
    {
        Filter {
            core: FilterCore::with_accuracy(n, fpr),
            hasher: H::default(),
            _elem: PhantomData,
        }
    }

    /// Capacity in bits obtained when sizing for `n` elements at false
    /// positive rate `fpr`. Zero when `n == 0` or `fpr >= 1.0`.
    ///
    /// # Panics
    ///
    /// Panics if `fpr` is outside `[0.0, 1.0]`.
    pub fn capacity_for(n: usize, fpr: f64) -> usize {
        FilterCore::<K, S, BUCKET_STRIDE>::capacity_for(n, fpr)
    }

    /// Modeled false positive rate for `n` elements in `m` bits.
    /// `0.0` when `n == 0`; `1.0` when `m == 0` and `n > 0`.
    pub fn fpr_for(n: usize, m: usize) -> f64 {
        FilterCore::<K, S, BUCKET_STRIDE>::fpr_for(n, m)
    }

    /// Inserts an element. On a zero-capacity filter this is a no-op.
    ///
    /// # Examples
    ///
    /// ```
    /// # use blockbloom::Filter;
    /// let mut filter: Filter<&str, 4> = Filter::new(1024);
    /// filter.insert(&"apple");
    /// assert!(filter.may_contain(&"apple"));
    /// ```
    #[inline]
    pub fn insert(&mut self, x: &T) {
        self.core.insert(self.hasher.hash64(x));
    }

    /// Tests whether an element is possibly in the set.
    ///
    /// Returns:
    /// - `true`: possibly inserted (or a false positive)
    /// - `false`: definitely not inserted
    ///
    /// A zero-capacity filter reports `true` for every element, the
    /// degenerate but sound approximation.
    #[inline]
    pub fn may_contain(&self, x: &T) -> bool {
        self.core.may_contain(self.hasher.hash64(x))
    }

    /// Capacity in bits; always a multiple of 8.
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Byte view of the bit array, `capacity() / 8` bytes long.
    pub fn array(&self) -> &[u8] {
        self.core.as_bytes()
    }

    /// Mutable byte view of the bit array, for reconstitution from
    /// serialized state.
    pub fn array_mut(&mut self) -> &mut [u8] {
        self.core.as_bytes_mut()
    }

    /// Sets every bit to zero; the shape is unchanged.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Clears the filter, reshaping to at least `m` bits first if that
    /// changes the bucket count. `reset(0)` releases the array.
    pub fn reset(&mut self, m: usize) {
        self.core.reset(m);
    }

    /// Intersects this filter with another of equal capacity: each bit
    /// becomes `a & b`. Nothing is mutated on error.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::IncompatibleCapacity`](crate::error::ErrorKind) if
    /// the capacities differ.
    pub fn combine_and(&mut self, other: &Self) -> Result<(), Error> {
        self.core.combine_and(&other.core)
    }

    /// Unions another filter of equal capacity into this one: each bit
    /// becomes `a | b`. Nothing is mutated on error.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::IncompatibleCapacity`](crate::error::ErrorKind) if
    /// the capacities differ.
    pub fn combine_or(&mut self, other: &Self) -> Result<(), Error> {
        self.core.combine_or(&other.core)
    }

    /// Serializes the filter: `u64` capacity in bits (little endian)
    /// followed by the raw array bytes.
    ///
    /// The type parameters are not encoded; peers must agree on them
    /// out-of-band for the bytes to mean the same thing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use blockbloom::Filter;
    /// let mut filter: Filter<u64, 2> = Filter::new(4096);
    /// filter.insert(&1);
    ///
    /// let bytes = filter.serialize();
    /// let restored: Filter<u64, 2> = Filter::deserialize(&bytes).unwrap();
    /// assert_eq!(filter, restored);
    /// assert!(restored.may_contain(&1));
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let array = self.array();
        let mut bytes = FilterBytes::with_capacity(8 + array.len());
        bytes.write_u64_le(self.capacity() as u64);
        bytes.write(array);
        bytes.into_bytes()
    }

    /// Deserializes a filter previously produced by
    /// [`serialize`](Self::serialize) with the same type parameters.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidData`](crate::error::ErrorKind) if the data
    /// is truncated, trailing bytes remain, or the capacity cannot be
    /// reproduced by this filter configuration.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error>
    where
        H: Default,
    {
        let mut cursor = FilterSlice::new(bytes);
        let capacity = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("capacity"))?;
        if capacity % 8 != 0 {
            return Err(Error::invalid_data(format!(
                "capacity {capacity} is not a multiple of 8"
            )));
        }
        if cursor.remaining() as u64 != capacity / 8 {
            return Err(Error::invalid_data(format!(
                "array byte count mismatch: expected {}, found {}",
                capacity / 8,
                cursor.remaining()
            )));
        }

        let mut filter = Self::new(capacity as usize);
        if filter.capacity() as u64 != capacity {
            return Err(Error::capacity_mismatch(capacity, filter.capacity()));
        }
        cursor
            .read_exact(filter.array_mut())
            .map_err(|_| Error::insufficient_data("array bytes"))?;
        Ok(filter)
    }
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> Default
    for Filter<T, K, S, BUCKET_STRIDE, H>
where
    T: Hash,
    S: Subfilter,
    H: FilterHash + Default,
{
    /// The zero-capacity filter.
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> Clone for Filter<T, K, S, BUCKET_STRIDE, H>
where
    S: Subfilter,
    H: FilterHash + Clone,
{
    fn clone(&self) -> Self {
        Filter {
            core: self.core.clone(),
            hasher: self.hasher.clone(),
            _elem: PhantomData,
        }
    }
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> PartialEq
    for Filter<T, K, S, BUCKET_STRIDE, H>
where
    S: Subfilter,
    H: FilterHash,
{
    /// Bitwise equality over the used array range. The hash policies
    /// are assumed equivalent by contract; they are part of the type.
    fn eq(&self, other: &Self) -> bool {
        self.core == other.core
    }
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> Eq for Filter<T, K, S, BUCKET_STRIDE, H>
where
    S: Subfilter,
    H: FilterHash,
{
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> std::fmt::Debug
    for Filter<T, K, S, BUCKET_STRIDE, H>
where
    S: Subfilter,
    H: FilterHash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("capacity", &self.core.capacity())
            .field("k", &K)
            .finish()
    }
}

impl<T, const K: usize, S, const BUCKET_STRIDE: usize, H> Extend<T>
    for Filter<T, K, S, BUCKET_STRIDE, H>
where
    T: Hash,
    S: Subfilter,
    H: FilterHash,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.insert(&x);
        }
    }
}
