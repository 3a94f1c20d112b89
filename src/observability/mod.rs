// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types live in [`messages`], grouped by subsystem, and are emitted
//! through `tracing`. Nothing here installs a subscriber implicitly; call
//! [`init_tracing`] from a binary or test that wants output.
//!
//! # Usage
//!
//! ```rust
//! the_sluice::observability::init_tracing();
//! tracing::debug!("pipeline assembled");
//! ```

use tracing_subscriber::EnvFilter;

pub mod messages;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "the_sluice=info";

/// Install a `fmt` subscriber filtered by `RUST_LOG` (falling back to
/// [`DEFAULT_LOG_FILTER`]). Calling it again is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
