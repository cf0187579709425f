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

//! Cache-aware blocked Bloom filters with configurable subfilter
//! strategies.
//!
//! The [`Filter`] type family implements approximate membership with
//! one-sided error: no false negatives and a tunable false positive
//! rate. Classical blocked, split-block ("multiblock") and SIMD
//! variants are all expressed through one engine parameterized by a
//! [`Subfilter`] strategy, the number of rounds `K` per element and an
//! optional bucket overlap.
//!
//! ```rust
//! use blockbloom::Filter;
//!
//! // K = 6 rounds of one bit in a byte-sized block each.
//! let mut filter: Filter<i32, 6> = Filter::with_accuracy(1000, 0.02);
//! filter.insert(&7);
//! assert!(filter.may_contain(&7));
//! ```
//!
//! See the [`filter`] module documentation for the configuration space
//! and the [`subfilter`] module for the available strategies.

pub mod error;
pub mod filter;
pub mod hash;
pub mod subfilter;

mod codec;
mod mulx;

pub use crate::filter::Avalanching;
pub use crate::filter::Filter;
pub use crate::filter::FilterHash;
pub use crate::filter::Mixed;
pub use crate::filter::CACHE_LINE_SIZE;
pub use crate::subfilter::Block;
pub use crate::subfilter::FastMultiblock32;
pub use crate::subfilter::Multiblock;
pub use crate::subfilter::Subfilter;
