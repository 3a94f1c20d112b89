//! Configuration validation for stream options.
//!
//! Every rule is checked and every violation reported, so a broken config
//! file can be fixed in one pass:
//!
//! 1. **Positive sizes**: `readable.buffer_size`, `writable.high_water_mark`
//!    and `pipe.chunk_size` (when set) must be non-zero
//! 2. **Watermark ordering**: each low-water mark must not exceed the limit
//!    it trails (`readable.buffer_size`, `writable.high_water_mark`)
//!
//! # Examples
//!
//! ```rust
//! use the_sluice::config::{validate_config, Config, StreamOptions};
//!
//! let config = Config {
//!     readable: StreamOptions::default().with_low_water_mark(1 << 20),
//!     ..Config::default()
//! };
//!
//! let errors = validate_config(&config).unwrap_err();
//! assert_eq!(errors.len(), 1);
//! ```

use crate::config::Config;
use crate::errors::ValidationError;

/// Validate a loaded configuration, collecting every violation.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.readable.buffer_size == 0 {
        errors.push(ValidationError::ZeroSize {
            field: "readable.buffer_size",
        });
    } else if config.readable.low_water_mark > config.readable.buffer_size {
        errors.push(ValidationError::WatermarkAboveLimit {
            field: "readable.low_water_mark",
            low_water_mark: config.readable.low_water_mark,
            limit_field: "readable.buffer_size",
            limit: config.readable.buffer_size,
        });
    }

    if config.writable.high_water_mark == 0 {
        errors.push(ValidationError::ZeroSize {
            field: "writable.high_water_mark",
        });
    } else if config.writable.low_water_mark > config.writable.high_water_mark {
        errors.push(ValidationError::WatermarkAboveLimit {
            field: "writable.low_water_mark",
            low_water_mark: config.writable.low_water_mark,
            limit_field: "writable.high_water_mark",
            limit: config.writable.high_water_mark,
        });
    }

    if config.pipe.chunk_size == Some(0) {
        errors.push(ValidationError::ZeroSize {
            field: "pipe.chunk_size",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
