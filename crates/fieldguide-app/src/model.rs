// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::*;

pub const DESCRIPTION_PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kingdom {
    Animalia,
    Plantae,
    Fungi,
    Protista,
    Archaea,
    Bacteria,
}

impl Kingdom {
    pub const ALL: [Self; 6] = [
        Self::Animalia,
        Self::Plantae,
        Self::Fungi,
        Self::Protista,
        Self::Archaea,
        Self::Bacteria,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Animalia => "Animalia",
            Self::Plantae => "Plantae",
            Self::Fungi => "Fungi",
            Self::Protista => "Protista",
            Self::Archaea => "Archaea",
            Self::Bacteria => "Bacteria",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Animalia" => Some(Self::Animalia),
            "Plantae" => Some(Self::Plantae),
            "Fungi" => Some(Self::Fungi),
            "Protista" => Some(Self::Protista),
            "Archaea" => Some(Self::Archaea),
            "Bacteria" => Some(Self::Bacteria),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub kingdom: Kingdom,
    pub total_population: Option<i64>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub author: UserId,
}

impl Species {
    /// Card preview: first 150 characters of the description plus an
    /// ellipsis, or an empty string when there is no description.
    pub fn description_preview(&self) -> String {
        let Some(description) = &self.description else {
            return String::new();
        };
        let mut preview: String = description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        preview.truncate(preview.trim_end().len());
        preview.push_str("...");
        preview
    }

    /// Display gate only; the service's row-level rules are the real check.
    pub fn editable_by(&self, user: &UserId) -> bool {
        self.author == *user
    }
}

pub fn format_population(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let mut chars = digits.chars().collect::<Vec<_>>();
    let mut count = 0usize;
    while let Some(ch) = chars.pop() {
        if count == 3 {
            out.push(',');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    out.chars().rev().collect()
}
