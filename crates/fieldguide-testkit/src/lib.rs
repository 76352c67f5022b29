// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use fieldguide_app::{Kingdom, Species, SpeciesId, UserId};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tiny_http::{Header, Response, Server};

pub const SAMPLE_USER: &str = "11111111-2222-3333-4444-555555555555";
pub const OTHER_USER: &str = "99999999-8888-7777-6666-555555555555";

const SAMPLE_ROWS: [(&str, Option<&str>, Kingdom, Option<i64>, Option<&str>); 4] = [
    (
        "Cavia porcellus",
        Some("Guinea pig"),
        Kingdom::Animalia,
        Some(700_000_000),
        Some("A domesticated rodent kept worldwide."),
    ),
    (
        "Sequoia sempervirens",
        Some("Coast redwood"),
        Kingdom::Plantae,
        None,
        Some("The tallest living trees on Earth."),
    ),
    (
        "Amanita muscaria",
        Some("Fly agaric"),
        Kingdom::Fungi,
        None,
        None,
    ),
    ("Halobacterium salinarum", None, Kingdom::Archaea, None, None),
];

pub fn sample_species(id: i64, author: &str) -> Species {
    let (scientific, common, kingdom, population, description) =
        SAMPLE_ROWS[(id.unsigned_abs() as usize) % SAMPLE_ROWS.len()];
    Species {
        id: SpeciesId::new(id),
        scientific_name: scientific.to_owned(),
        common_name: common.map(str::to_owned),
        kingdom,
        total_population: population,
        image: None,
        description: description.map(str::to_owned),
        author: UserId::new(author),
    }
}

pub fn species_rows_json(rows: &[Species]) -> Result<String> {
    serde_json::to_string(rows).context("encode species rows")
}

pub fn session_user_json(user_id: &str, email: &str) -> String {
    format!(r#"{{"id":"{user_id}","email":"{email}"}}"#)
}

/// One scripted response served in order; the request that consumed it is
/// recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub prefer: Option<String>,
    pub authorization: Option<String>,
}

/// In-process mock of the hosted data/auth service. Serves the scripted
/// responses in order on a background thread; `finish` joins the thread and
/// returns the requests it saw.
pub struct MockService {
    base_url: String,
    handle: JoinHandle<()>,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl MockService {
    pub fn start(responses: Vec<MockResponse>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock service: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let received = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&received);
        let handle = std::thread::spawn(move || {
            for scripted in responses {
                let mut request = match server.recv() {
                    Ok(request) => request,
                    Err(_) => return,
                };

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let header_value = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv(name))
                        .map(|header| header.value.as_str().to_owned())
                };
                if let Ok(mut seen) = seen.lock() {
                    seen.push(ReceivedRequest {
                        method: request.method().as_str().to_owned(),
                        url: request.url().to_owned(),
                        body,
                        prefer: header_value("Prefer"),
                        authorization: header_value("Authorization"),
                    });
                }

                let response = Response::from_string(scripted.body)
                    .with_status_code(scripted.status)
                    .with_header(
                        Header::from_bytes("Content-Type", "application/json")
                            .expect("valid content type header"),
                    );
                let _ = request.respond(response);
            }
        });

        Ok(Self {
            base_url,
            handle,
            received,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn finish(self) -> Result<Vec<ReceivedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock service thread panicked"))?;
        let received = self
            .received
            .lock()
            .map_err(|_| anyhow!("mock service request log poisoned"))?;
        Ok(received.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{MockResponse, MockService, sample_species, species_rows_json};
    use anyhow::Result;

    #[test]
    fn sample_species_are_stable_per_id() {
        let first = sample_species(1, super::SAMPLE_USER);
        let again = sample_species(1, super::SAMPLE_USER);
        assert_eq!(first, again);
        assert_eq!(first.id.get(), 1);
        assert_eq!(first.author.as_str(), super::SAMPLE_USER);
    }

    #[test]
    fn species_rows_encode_as_json_array() -> Result<()> {
        let rows = vec![sample_species(2, super::SAMPLE_USER)];
        let encoded = species_rows_json(&rows)?;
        assert!(encoded.starts_with('['));
        assert!(encoded.contains("\"scientific_name\""));
        Ok(())
    }

    #[test]
    fn mock_service_records_requests_in_order() -> Result<()> {
        let service = MockService::start(vec![MockResponse::json(200, "[]")])?;
        let url = format!("{}/rest/v1/species", service.base_url());

        let mut body = String::new();
        {
            use std::io::{Read, Write};
            let addr = url
                .trim_start_matches("http://")
                .split('/')
                .next()
                .expect("mock address")
                .to_owned();
            let mut stream = std::net::TcpStream::connect(&addr)?;
            write!(
                stream,
                "GET /rest/v1/species HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"
            )?;
            stream.read_to_string(&mut body)?;
        }
        assert!(body.contains("200"));

        let received = service.finish()?;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method, "GET");
        assert_eq!(received[0].url, "/rest/v1/species");
        Ok(())
    }
}
