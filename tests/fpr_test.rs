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

use blockbloom::subfilter::Block;
use blockbloom::subfilter::Multiblock;
use blockbloom::Filter;
use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;

#[test]
fn test_fpr_monotone_in_n() {
    type F = Filter<u64, 2, Multiblock<u32, 4>>;
    let mut prev = 0.0;
    for n in [0usize, 100, 1000, 10_000, 100_000] {
        let p = F::fpr_for(n, 80_000);
        assert_that!(p, ge(prev));
        prev = p;
    }
    assert_eq!(F::fpr_for(0, 80_000), 0.0);
}

#[test]
fn test_fpr_monotone_in_m() {
    type F = Filter<u64, 2, Multiblock<u32, 4>>;
    let mut prev = 1.0;
    for m in [0usize, 8_000, 80_000, 800_000, 8_000_000] {
        let p = F::fpr_for(10_000, m);
        assert_that!(p, le(prev));
        prev = p;
    }
    assert_eq!(F::fpr_for(10_000, 0), 1.0);
}

/// K = 6 single-bit byte blocks at 8 bits per element sit at ~2.16%
/// false positives; the empirical rate and the model must both land in
/// the band.
#[test]
fn test_integer_fpr_matches_model() {
    const N: usize = 50_000;
    const PROBES: i32 = 200_000;

    let mut filter: Filter<i32, 6> = Filter::new(8 * N);
    for i in 0..N as i32 {
        filter.insert(&i);
    }

    let mut false_positives = 0u32;
    for i in 0..PROBES {
        // Disjoint from the inserted range.
        if filter.may_contain(&(1_000_000 + i)) {
            false_positives += 1;
        }
    }
    let empirical = f64::from(false_positives) / f64::from(PROBES);
    assert_that!(empirical, ge(0.0216 - 0.005));
    assert_that!(empirical, le(0.0216 + 0.005));

    let modeled = Filter::<i32, 6>::fpr_for(N, filter.capacity());
    assert_that!(modeled, ge(0.0216 - 0.005));
    assert_that!(modeled, le(0.0216 + 0.005));
}

/// One round of block<u64, 4> at 8 bits per element: the published band
/// for this shape is 3.0%-3.7%.
#[test]
fn test_block_fpr_band() {
    const N: usize = 50_000;
    const PROBES: i32 = 200_000;

    let mut filter: Filter<i32, 1, Block<u64, 4>> = Filter::new(8 * N);
    for i in 0..N as i32 {
        filter.insert(&i);
    }

    let mut false_positives = 0u32;
    for i in 0..PROBES {
        if filter.may_contain(&(1_000_000 + i)) {
            false_positives += 1;
        }
    }
    let empirical = f64::from(false_positives) / f64::from(PROBES);
    assert_that!(empirical, ge(0.030));
    assert_that!(empirical, le(0.037));

    let modeled = Filter::<i32, 1, Block<u64, 4>>::fpr_for(N, filter.capacity());
    assert_that!(modeled, ge(0.030));
    assert_that!(modeled, le(0.037));
}

/// Overlapping buckets (stride 1) spread the same bits over twice the
/// window and lower the false positive rate; the measured ratio against
/// the non-overlapping layout lies in a known band.
#[test]
fn test_overlap_lowers_fpr() {
    const N: usize = 30_000;
    const PROBES: i32 = 300_000;

    let mut tiled: Filter<i32, 1, Multiblock<u8, 9>, 0> = Filter::new(12 * N);
    let mut overlapped: Filter<i32, 1, Multiblock<u8, 9>, 1> = Filter::new(12 * N);
    for i in 0..N as i32 {
        tiled.insert(&i);
        overlapped.insert(&i);
    }

    let mut fp_tiled = 0u32;
    let mut fp_overlapped = 0u32;
    for i in 0..PROBES {
        let probe = 1_000_000 + i;
        if tiled.may_contain(&probe) {
            fp_tiled += 1;
        }
        if overlapped.may_contain(&probe) {
            fp_overlapped += 1;
        }
    }

    assert!(fp_tiled > 0, "tiled layout produced no false positives");
    let ratio = f64::from(fp_overlapped) / f64::from(fp_tiled);
    assert_that!(ratio, ge(0.55));
    assert_that!(ratio, le(0.75));
}

/// The realized rate tracks the analytic model within 1.5x in either
/// direction once the filter is reasonably loaded.
#[test]
fn test_fpr_realization_tracks_model() {
    const N: usize = 20_000;
    const PROBES: i32 = 300_000;

    let mut filter: Filter<i32, 1, Multiblock<u64, 8>> = Filter::new(12 * N);
    for i in 0..N as i32 {
        filter.insert(&i);
    }

    let mut false_positives = 0u32;
    for i in 0..PROBES {
        if filter.may_contain(&(1_000_000 + i)) {
            false_positives += 1;
        }
    }
    let empirical = f64::from(false_positives) / f64::from(PROBES);
    let modeled = Filter::<i32, 1, Multiblock<u64, 8>>::fpr_for(N, filter.capacity());

    assert_that!(empirical, le(modeled * 1.5));
    assert_that!(empirical, ge(modeled / 1.5));
}

/// with_accuracy sizes the filter so the realized rate honors the
/// requested target.
#[test]
fn test_with_accuracy_realizes_target() {
    const N: usize = 20_000;
    const PROBES: i32 = 200_000;
    const TARGET: f64 = 0.01;

    let mut filter: Filter<i32, 2, Multiblock<u32, 4>> = Filter::with_accuracy(N, TARGET);
    for i in 0..N as i32 {
        filter.insert(&i);
    }

    let mut false_positives = 0u32;
    for i in 0..PROBES {
        if filter.may_contain(&(1_000_000 + i)) {
            false_positives += 1;
        }
    }
    let empirical = f64::from(false_positives) / f64::from(PROBES);
    assert_that!(empirical, le(TARGET * 1.5));
}
