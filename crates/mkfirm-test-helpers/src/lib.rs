//! Shared test utilities for mkfirm.
//!
//! Test code in the workspace is held to the same panic-free lint set as the
//! library, so `unwrap()`/`expect()` are replaced by the helpers here. They
//! panic with the offending value and `#[track_caller]` points at the test line.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with context
//! - [`assertions`] - Assertion macros for float and ordering checks
//!
//! ```rust
//! use mkfirm_test_helpers::{must, must_some};
//!
//! let parsed: Result<u32, String> = Ok(3);
//! assert_eq!(must(parsed), 3);
//! assert_eq!(must_some(Some('k'), "window letter"), 'k');
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assertions;
pub mod must;

pub use must::*;
