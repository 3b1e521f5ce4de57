//! Validation utilities for pipeline configuration and image inputs
//!
//! Configuration is read from files and the environment, so every numeric
//! knob is range-checked before a pipeline is built from it.

use anyhow::{anyhow, Result};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for the identifier word and its variants
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate an identifier-like word (identifier, OCR variant)
pub fn validate_word(value: &str, field_name: &str) -> Result<()> {
    validate_non_empty(value, field_name)?;
    validate_length(value, MAX_IDENTIFIER_LENGTH, field_name)?;
    Ok(())
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate value is within range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    // NaN fails both comparisons, reject it explicitly through partial_cmp
    if value.partial_cmp(&min).is_none() || value < min || value > max {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

/// Validate a probability-like value in [0, 1]
pub fn validate_unit_interval(value: f32, field_name: &str) -> Result<()> {
    validate_range(value, 0.0, 1.0, field_name)
}

/// Validate image dimensions are usable
pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(anyhow!(
            "image dimensions must be positive, got {}x{}",
            width,
            height
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
