// SPDX-License-Identifier: MIT

//! ldrepl-cache: the `CacheFacade` trait plus `JsonCache`, its file-backed
//! implementation.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod atomic;
pub mod error;
pub mod facade;
pub mod filter;
pub mod json_cache;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::CacheError;
pub use facade::CacheFacade;
pub use filter::SearchFilter;
pub use json_cache::JsonCache;

#[cfg(any(test, feature = "test-support"))]
pub use fake::CacheFake;
