// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Species;

/// Case-insensitive substring match across the three searchable text
/// fields. An empty query matches everything; a missing optional field never
/// matches on its own.
pub fn matches_query(species: &Species, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }

    let needle = query.to_lowercase();
    if species.scientific_name.to_lowercase().contains(&needle) {
        return true;
    }
    if let Some(common_name) = &species.common_name
        && common_name.to_lowercase().contains(&needle)
    {
        return true;
    }
    if let Some(description) = &species.description
        && description.to_lowercase().contains(&needle)
    {
        return true;
    }
    false
}

/// Filters in place order: the service returns records ordered by id
/// descending and the filtered set keeps that order, no re-sort.
pub fn filter_species<'a>(species: &'a [Species], query: &str) -> Vec<&'a Species> {
    species
        .iter()
        .filter(|record| matches_query(record, query))
        .collect()
}
