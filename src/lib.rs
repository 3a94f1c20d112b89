// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // options, loader, validation
pub mod engine;     // pull engine, flow loop, transform
pub mod errors;     // error handling
pub mod observability;
pub mod traits;     // chunk, source, sink and step abstractions
