// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    Required,
    InvalidPopulation,
    PopulationTooSmall,
    InvalidUrl,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => f.write_str("value is required"),
            Self::InvalidPopulation => f.write_str("population must be a whole number"),
            Self::PopulationTooSmall => f.write_str("population must be at least 1"),
            Self::InvalidUrl => f.write_str("not a valid URL"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Required text: reject empty-after-trim, store trimmed.
pub fn normalize_required_text(input: &str) -> ValidationResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required);
    }
    Ok(trimmed.to_owned())
}

/// Optional text: empty or all-whitespace becomes None, anything else is
/// stored trimmed.
pub fn normalize_optional_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

pub fn parse_optional_population(input: &str) -> ValidationResult<Option<i64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = trimmed
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidPopulation)?;
    validate_population(value).map(Some)
}

pub fn validate_population(value: i64) -> ValidationResult<i64> {
    if value < 1 {
        return Err(ValidationError::PopulationTooSmall);
    }
    Ok(value)
}

pub fn parse_optional_image_url(input: &str) -> ValidationResult<Option<String>> {
    let Some(trimmed) = normalize_optional_text(input) else {
        return Ok(None);
    };
    Url::parse(&trimmed).map_err(|_| ValidationError::InvalidUrl)?;
    Ok(Some(trimmed))
}
