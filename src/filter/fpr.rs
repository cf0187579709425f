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

//! Analytic false-positive model and its numeric inversion.
//!
//! The model treats the number of elements sharing a bucket window as
//! Poisson-distributed and mixes the subfilter's per-cell FPR over that
//! distribution. Capacity planning inverts the model by bracketing and
//! bisecting on c = m/n, the bits spent per element.

/// Poisson series length cap. The summation terminates earlier once the
/// terms are on the descending slope and stop contributing.
const MAX_POISSON_TERMS: usize = 1000;

/// FPR model of one monomorphized filter configuration.
///
/// `w_bits` is the effective bucket window in bits: `2 * used_block -
/// bucket_stride` bytes, which collapses to the used block width when
/// buckets do not overlap. `cell_fpr` is the subfilter's closed form.
#[derive(Clone, Copy)]
pub(crate) struct FprModel {
    pub k: usize,
    pub k_total: usize,
    pub w_bits: usize,
    pub cell_fpr: fn(usize, usize) -> f64,
}

impl FprModel {
    /// False positive rate at c = m/n bits per element.
    pub(crate) fn fpr_for_c(&self, c: f64) -> f64 {
        let w = self.w_bits as f64;
        let lambda = w * self.k as f64 / c;
        let loglambda = lambda.ln();
        let mut res = 0.0f64;
        let mut deltap = 0.0f64;
        let mut ln_factorial = 0.0f64;
        for i in 0..MAX_POISSON_TERMS {
            if i > 0 {
                ln_factorial += (i as f64).ln();
            }
            let poisson = (i as f64 * loglambda - lambda - ln_factorial).exp();
            let delta = poisson * (self.cell_fpr)(i, self.w_bits);
            let resn = res + delta;

            // The terms of this summation are unimodal, so we check
            // we're on the descending slope before stopping.
            if delta < deltap && resn == res {
                break;
            }
            deltap = delta;
            res = resn;
        }

        // Truncation, loop exhaustion and the Poisson approximation can
        // land below the classical Bloom filter formula, which is the
        // minimum attainable.
        let classical = (1.0 - (-(self.k_total as f64) / c).exp()).powi(self.k_total as i32);
        res.powi(self.k as i32).max(classical)
    }

    /// False positive rate for `n` elements in `m` bits.
    pub(crate) fn fpr_for(&self, n: usize, m: usize) -> f64 {
        if n == 0 {
            0.0
        } else if m == 0 {
            1.0
        } else {
            self.fpr_for_c(m as f64 / n as f64)
        }
    }

    /// Smallest capacity in bits whose modeled FPR does not exceed
    /// `fpr`, before rounding to whole buckets.
    ///
    /// # Panics
    ///
    /// Panics if `fpr` is outside `[0.0, 1.0]`.
    pub(crate) fn unadjusted_capacity_for(&self, n: usize, fpr: f64) -> usize {
        assert!(
            (0.0..=1.0).contains(&fpr),
            "fpr must be between 0.0 and 1.0"
        );
        if n == 0 {
            return 0;
        }

        let eps = 1.0 / usize::MAX as f64;
        let c_max = usize::MAX as f64 / n as f64;

        // Capacity of a classical Bloom filter as a lower bound:
        // c = k / -log(1 - fpr^(1/k)).
        let d = 1.0 - fpr.powf(1.0 / self.k_total as f64);
        if d == 0.0 {
            return 0; // fpr ~ 1
        }
        let l = d.ln();
        if l == 0.0 {
            return saturating_cells(c_max, n); // fpr ~ 0
        }
        let mut c0 = (self.k_total as f64 / -l).min(c_max);

        // Bracket the target fpr between c0 and c1.
        let mut c1 = c0;
        if self.fpr_for_c(c1) > fpr {
            // Expected case.
            loop {
                let cn = c1 * 1.5;
                if cn > c_max {
                    return saturating_cells(c_max, n);
                }
                c0 = c1;
                c1 = cn;
                if self.fpr_for_c(c1) <= fpr {
                    break;
                }
            }
        } else {
            // c0 shouldn't overshoot ever, just in case.
            loop {
                let cn = c0 / 1.5;
                c1 = c0;
                c0 = cn;
                if self.fpr_for_c(c0) >= fpr {
                    break;
                }
            }
        }

        // Bisect.
        let mut cm;
        loop {
            cm = c0 + (c1 - c0) / 2.0;
            if !(cm > c0 && cm < c1 && c1 - c0 >= eps) {
                break;
            }
            if self.fpr_for_c(cm) > fpr {
                c0 = cm;
            } else {
                c1 = cm;
            }
        }
        saturating_cells(cm, n)
    }
}

/// `c * n` as a capacity, relying on the saturating float-to-int cast.
fn saturating_cells(c: f64, n: usize) -> usize {
    (c * n as f64) as usize
}
