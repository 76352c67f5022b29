// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use fieldguide_api::Client;
use fieldguide_app::{Species, SpeciesFields, SpeciesId, UserId};

/// Bridges the terminal loop to the hosted service. Holds the signed-in user
/// so inserts carry the right author without the form layer knowing about
/// sessions.
pub struct ServiceRuntime<'a> {
    client: &'a Client,
    user: UserId,
}

impl<'a> ServiceRuntime<'a> {
    pub fn new(client: &'a Client, user: UserId) -> Self {
        Self { client, user }
    }
}

impl fieldguide_tui::AppRuntime for ServiceRuntime<'_> {
    fn current_user(&self) -> &UserId {
        &self.user
    }

    fn load_species(&mut self) -> Result<Vec<Species>> {
        self.client.list_species()
    }

    fn create_species(&mut self, fields: &SpeciesFields) -> Result<Species> {
        self.client.insert_species(fields, &self.user)
    }

    fn update_species(&mut self, id: SpeciesId, fields: &SpeciesFields) -> Result<Species> {
        self.client.update_species(id, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceRuntime;
    use anyhow::Result;
    use fieldguide_api::Client;
    use fieldguide_app::{Kingdom, SpeciesFields, SpeciesId, UserId};
    use fieldguide_testkit::{
        MockResponse, MockService, SAMPLE_USER, sample_species, species_rows_json,
    };
    use fieldguide_tui::AppRuntime;
    use std::time::Duration;

    fn signed_in_client(base_url: &str) -> Result<Client> {
        let mut client = Client::new(base_url, "anon-key", Duration::from_secs(1))?;
        client.set_access_token("token-1");
        Ok(client)
    }

    fn fields() -> SpeciesFields {
        SpeciesFields {
            scientific_name: "Cavia porcellus".to_owned(),
            common_name: None,
            kingdom: Kingdom::Animalia,
            total_population: None,
            image: None,
            description: None,
        }
    }

    #[test]
    fn load_species_returns_service_rows() -> Result<()> {
        let rows = vec![sample_species(1, SAMPLE_USER)];
        let service = MockService::start(vec![MockResponse::json(200, species_rows_json(&rows)?)])?;
        let client = signed_in_client(service.base_url())?;

        let mut runtime = ServiceRuntime::new(&client, UserId::new(SAMPLE_USER));
        assert_eq!(runtime.load_species()?, rows);
        assert_eq!(runtime.current_user(), &UserId::new(SAMPLE_USER));

        service.finish()?;
        Ok(())
    }

    #[test]
    fn create_species_attaches_the_session_user() -> Result<()> {
        let created = sample_species(5, SAMPLE_USER);
        let service = MockService::start(vec![MockResponse::json(
            201,
            species_rows_json(std::slice::from_ref(&created))?,
        )])?;
        let client = signed_in_client(service.base_url())?;

        let mut runtime = ServiceRuntime::new(&client, UserId::new(SAMPLE_USER));
        let row = runtime.create_species(&fields())?;
        assert_eq!(row, created);

        let received = service.finish()?;
        assert!(
            received[0]
                .body
                .contains(&format!("\"author\":\"{SAMPLE_USER}\""))
        );
        Ok(())
    }

    #[test]
    fn update_species_patches_by_id() -> Result<()> {
        let updated = sample_species(3, SAMPLE_USER);
        let service = MockService::start(vec![MockResponse::json(
            200,
            species_rows_json(std::slice::from_ref(&updated))?,
        )])?;
        let client = signed_in_client(service.base_url())?;

        let mut runtime = ServiceRuntime::new(&client, UserId::new(SAMPLE_USER));
        runtime.update_species(SpeciesId::new(3), &fields())?;

        let received = service.finish()?;
        assert_eq!(received[0].method, "PATCH");
        assert_eq!(received[0].url, "/rest/v1/species?id=eq.3");
        Ok(())
    }
}
