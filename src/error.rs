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

//! Error types for filter operations

use std::fmt;

/// ErrorKind is all kinds of Error returned by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The argument provided is invalid.
    InvalidArgument,
    /// Serialized filter data is malformed or does not match this
    /// filter configuration.
    InvalidData,
    /// Two filters of different capacity were combined.
    IncompatibleCapacity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidData => "InvalidData",
            ErrorKind::IncompatibleCapacity => "IncompatibleCapacity",
        })
    }
}

/// Error returned by all fallible filter operations.
///
/// Every failure in this crate is capacity-shaped or data-shaped, so an
/// error is a kind, a message, and — when two sizes disagreed — the pair
/// of bit capacities involved.
///
/// # Examples
///
/// ```
/// # use blockbloom::error::Error;
/// # use blockbloom::error::ErrorKind;
/// let err = Error::new(ErrorKind::InvalidArgument, "bad input");
/// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
/// assert_eq!(err.message(), "bad input");
/// assert_eq!(err.capacities(), None);
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    /// `(expected, actual)` bit counts for capacity disagreements.
    capacities: Option<(u64, u64)>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            capacities: None,
        }
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// The bit capacities a capacity-shaped failure was about, as
    /// `(expected, actual)`. `None` for failures with no sizes attached.
    pub fn capacities(&self) -> Option<(u64, u64)> {
        self.capacities
    }
}

// Convenience constructors
impl Error {
    pub(crate) fn incompatible_capacity(expected: usize, actual: usize) -> Self {
        Error {
            kind: ErrorKind::IncompatibleCapacity,
            message: "filters must have equal capacity".into(),
            capacities: Some((expected as u64, actual as u64)),
        }
    }

    pub(crate) fn invalid_data(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidData, msg)
    }

    pub(crate) fn insufficient_data(msg: impl fmt::Display) -> Self {
        Self::invalid_data(format!("insufficient data: {msg}"))
    }

    pub(crate) fn capacity_mismatch(serialized: u64, reconstructed: usize) -> Self {
        Error {
            kind: ErrorKind::InvalidData,
            message: "serialized capacity is not reproducible by this filter type".into(),
            capacities: Some((serialized, reconstructed as u64)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some((expected, actual)) = self.capacities {
            write!(f, " (expected {expected} bits, found {actual} bits)")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
