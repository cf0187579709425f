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

mod common;

use blockbloom::error::ErrorKind;
use blockbloom::subfilter::Multiblock;
use blockbloom::Filter;
use common::SplitMix64;

type UuidFilter = Filter<u128, 1, Multiblock<u64, 8>>;

/// 10_000 deterministic UUID-shaped values survive a serialize /
/// reconstruct cycle: a second identical generator run finds every one
/// of them.
#[test]
fn test_uuid_roundtrip() {
    const SEED: u64 = 0x5EED_CAFE;
    const N: usize = 10_000;

    let mut filter = UuidFilter::with_accuracy(N, 0.005);
    let mut gen = SplitMix64::new(SEED);
    for _ in 0..N {
        let uuid = gen.next_u128();
        filter.insert(&uuid);
    }

    let bytes = filter.serialize();
    assert_eq!(bytes.len(), 8 + filter.capacity() / 8);

    let restored = UuidFilter::deserialize(&bytes).unwrap();
    assert_eq!(restored, filter);
    assert_eq!(restored.capacity(), filter.capacity());

    let mut replay = SplitMix64::new(SEED);
    for _ in 0..N {
        let uuid = replay.next_u128();
        assert!(restored.may_contain(&uuid));
    }
}

/// Reconstructing through the raw byte view yields a bit-identical
/// filter that answers identically.
#[test]
fn test_array_copy_roundtrip() {
    let mut filter: Filter<u64, 3> = Filter::new(40_000);
    let mut gen = SplitMix64::new(99);
    let values: Vec<u64> = (0..3000).map(|_| gen.next()).collect();
    for v in &values {
        filter.insert(v);
    }

    let mut copy: Filter<u64, 3> = Filter::new(filter.capacity());
    copy.array_mut().copy_from_slice(filter.array());

    assert_eq!(copy, filter);
    for v in &values {
        assert!(copy.may_contain(v));
    }
    let mut probes = SplitMix64::new(123_456);
    for _ in 0..10_000 {
        let p = probes.next();
        assert_eq!(copy.may_contain(&p), filter.may_contain(&p));
    }
}

#[test]
fn test_empty_filter_roundtrip() {
    let filter: Filter<u64, 2> = Filter::default();
    let bytes = filter.serialize();
    assert_eq!(bytes.len(), 8);

    let restored: Filter<u64, 2> = Filter::deserialize(&bytes).unwrap();
    assert_eq!(restored.capacity(), 0);
    assert_eq!(restored, filter);
    assert!(restored.may_contain(&1));
}

#[test]
fn test_deserialize_rejects_truncation() {
    let mut filter: Filter<u64, 2> = Filter::new(4096);
    filter.insert(&1);
    let bytes = filter.serialize();

    for cut in [0usize, 4, 8, bytes.len() - 1] {
        let err = Filter::<u64, 2>::deserialize(&bytes[..cut]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData, "cut at {cut}");
    }
}

#[test]
fn test_deserialize_rejects_trailing_bytes() {
    let filter: Filter<u64, 2> = Filter::new(4096);
    let mut bytes = filter.serialize();
    bytes.push(0);
    let err = Filter::<u64, 2>::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_deserialize_rejects_unreachable_capacity() {
    // 8 bits cannot be produced by a 64-byte-block configuration; the
    // smallest nonempty filter is three buckets wide.
    let mut bytes = 8u64.to_le_bytes().to_vec();
    bytes.push(0);
    let err = UuidFilter::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_deserialize_rejects_unaligned_capacity() {
    let bytes = 13u64.to_le_bytes().to_vec();
    let err = Filter::<u64, 2>::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}
