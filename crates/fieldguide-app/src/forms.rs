// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;

use crate::validation::{
    ValidationError, normalize_optional_text, normalize_required_text, parse_optional_image_url,
    parse_optional_population,
};
use crate::{Kingdom, Species};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Create,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesField {
    ScientificName,
    CommonName,
    Kingdom,
    TotalPopulation,
    Image,
    Description,
}

impl SpeciesField {
    pub const ALL: [Self; 6] = [
        Self::ScientificName,
        Self::CommonName,
        Self::Kingdom,
        Self::TotalPopulation,
        Self::Image,
        Self::Description,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::ScientificName => "scientific name",
            Self::CommonName => "common name",
            Self::Kingdom => "kingdom",
            Self::TotalPopulation => "total population",
            Self::Image => "image URL",
            Self::Description => "description",
        }
    }
}

/// Normalized field set, ready for an insert or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesFields {
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub kingdom: Kingdom,
    pub total_population: Option<i64>,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// Raw form state as the user types it. Text fields stay unnormalized until
/// submit; `field_error` reflects what an inline message would show for the
/// current contents of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesFormInput {
    pub scientific_name: String,
    pub common_name: String,
    pub kingdom: Kingdom,
    pub total_population: String,
    pub image: String,
    pub description: String,
}

impl SpeciesFormInput {
    pub fn blank() -> Self {
        Self {
            scientific_name: String::new(),
            common_name: String::new(),
            kingdom: Kingdom::Animalia,
            total_population: String::new(),
            image: String::new(),
            description: String::new(),
        }
    }

    /// Edit form defaults: the existing record rendered back into editable
    /// text.
    pub fn from_species(species: &Species) -> Self {
        Self {
            scientific_name: species.scientific_name.clone(),
            common_name: species.common_name.clone().unwrap_or_default(),
            kingdom: species.kingdom,
            total_population: species
                .total_population
                .map(|value| value.to_string())
                .unwrap_or_default(),
            image: species.image.clone().unwrap_or_default(),
            description: species.description.clone().unwrap_or_default(),
        }
    }

    pub fn field_text(&self, field: SpeciesField) -> String {
        match field {
            SpeciesField::ScientificName => self.scientific_name.clone(),
            SpeciesField::CommonName => self.common_name.clone(),
            SpeciesField::Kingdom => self.kingdom.as_str().to_owned(),
            SpeciesField::TotalPopulation => self.total_population.clone(),
            SpeciesField::Image => self.image.clone(),
            SpeciesField::Description => self.description.clone(),
        }
    }

    pub fn field_text_mut(&mut self, field: SpeciesField) -> Option<&mut String> {
        match field {
            SpeciesField::ScientificName => Some(&mut self.scientific_name),
            SpeciesField::CommonName => Some(&mut self.common_name),
            SpeciesField::Kingdom => None,
            SpeciesField::TotalPopulation => Some(&mut self.total_population),
            SpeciesField::Image => Some(&mut self.image),
            SpeciesField::Description => Some(&mut self.description),
        }
    }

    pub fn cycle_kingdom(&mut self, delta: isize) {
        let kingdoms = Kingdom::ALL;
        let current = kingdoms
            .iter()
            .position(|kingdom| *kingdom == self.kingdom)
            .unwrap_or(0) as isize;
        let len = kingdoms.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.kingdom = kingdoms[next];
    }

    /// Revalidates one field against its current text. Runs on every field
    /// change so the form can surface inline errors immediately.
    pub fn field_error(&self, field: SpeciesField) -> Option<ValidationError> {
        match field {
            SpeciesField::ScientificName => normalize_required_text(&self.scientific_name).err(),
            SpeciesField::CommonName | SpeciesField::Description | SpeciesField::Kingdom => None,
            SpeciesField::TotalPopulation => parse_optional_population(&self.total_population).err(),
            SpeciesField::Image => parse_optional_image_url(&self.image).err(),
        }
    }

    pub fn first_error(&self) -> Option<(SpeciesField, ValidationError)> {
        SpeciesField::ALL
            .iter()
            .find_map(|field| self.field_error(*field).map(|error| (*field, error)))
    }

    /// Submission gate: true only when every field validates.
    pub fn is_valid(&self) -> bool {
        self.first_error().is_none()
    }

    /// Blank-to-null, trim normalization applied to every optional field;
    /// fails naming the offending field so no request is issued.
    pub fn normalized(&self) -> Result<SpeciesFields> {
        if let Some((field, error)) = self.first_error() {
            bail!("{}: {error} -- fix the field and retry", field.label());
        }

        Ok(SpeciesFields {
            scientific_name: normalize_required_text(&self.scientific_name)?,
            common_name: normalize_optional_text(&self.common_name),
            kingdom: self.kingdom,
            total_population: parse_optional_population(&self.total_population)?,
            image: parse_optional_image_url(&self.image)?,
            description: normalize_optional_text(&self.description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{SpeciesField, SpeciesFormInput};
    use crate::validation::ValidationError;
    use crate::{Kingdom, Species, SpeciesId, UserId};

    fn valid_input() -> SpeciesFormInput {
        SpeciesFormInput {
            scientific_name: "Cavia porcellus".to_owned(),
            common_name: "Guinea pig".to_owned(),
            kingdom: Kingdom::Animalia,
            total_population: "700000000".to_owned(),
            image: "https://example.com/cavy.jpg".to_owned(),
            description: "A domesticated rodent.".to_owned(),
        }
    }

    #[test]
    fn blank_form_flags_only_the_required_field() {
        let input = SpeciesFormInput::blank();
        assert_eq!(
            input.first_error(),
            Some((SpeciesField::ScientificName, ValidationError::Required))
        );
        assert!(!input.is_valid());
    }

    #[test]
    fn valid_form_passes_every_field() {
        let input = valid_input();
        for field in SpeciesField::ALL {
            assert_eq!(input.field_error(field), None, "field {field:?}");
        }
        assert!(input.is_valid());
    }

    #[test]
    fn zero_population_blocks_submission() {
        let mut input = valid_input();
        input.total_population = "0".to_owned();
        assert_eq!(
            input.field_error(SpeciesField::TotalPopulation),
            Some(ValidationError::PopulationTooSmall)
        );
        assert!(input.normalized().is_err());
    }

    #[test]
    fn whitespace_image_normalizes_to_null() {
        let mut input = valid_input();
        input.image = "   ".to_owned();
        let fields = input.normalized().expect("form should normalize");
        assert_eq!(fields.image, None);
    }

    #[test]
    fn optional_fields_blank_to_null_and_trim() {
        let mut input = valid_input();
        input.common_name = "  ".to_owned();
        input.description = " rodent ".to_owned();
        let fields = input.normalized().expect("form should normalize");
        assert_eq!(fields.common_name, None);
        assert_eq!(fields.description, Some("rodent".to_owned()));
    }

    #[test]
    fn normalized_error_names_the_field() {
        let mut input = valid_input();
        input.image = "not-a-url".to_owned();
        let error = input.normalized().expect_err("bad url should fail");
        assert!(error.to_string().contains("image URL"));
    }

    #[test]
    fn kingdom_cycling_wraps_both_directions() {
        let mut input = valid_input();
        input.kingdom = Kingdom::Bacteria;
        input.cycle_kingdom(1);
        assert_eq!(input.kingdom, Kingdom::Animalia);
        input.cycle_kingdom(-1);
        assert_eq!(input.kingdom, Kingdom::Bacteria);
    }

    #[test]
    fn edit_defaults_round_trip_the_record() {
        let species = Species {
            id: SpeciesId::new(7),
            scientific_name: "Amanita muscaria".to_owned(),
            common_name: None,
            kingdom: Kingdom::Fungi,
            total_population: None,
            image: None,
            description: Some("Fly agaric.".to_owned()),
            author: UserId::new("user-1"),
        };

        let input = SpeciesFormInput::from_species(&species);
        assert_eq!(input.scientific_name, "Amanita muscaria");
        assert_eq!(input.common_name, "");
        assert_eq!(input.kingdom, Kingdom::Fungi);

        let fields = input.normalized().expect("defaults should be valid");
        assert_eq!(fields.scientific_name, species.scientific_name);
        assert_eq!(fields.common_name, None);
        assert_eq!(fields.description, species.description);
    }
}
