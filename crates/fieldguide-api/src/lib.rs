// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use fieldguide_app::{Species, SpeciesFields, SpeciesId, UserId};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

const SPECIES_TABLE: &str = "species";

/// Authenticated user context returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
}

/// Result of a password sign-in: the bearer token to store in config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub access_token: String,
    pub user_id: UserId,
    pub expires_at: Option<OffsetDateTime>,
}

pub fn validate_base_url(base_url: &str) -> Result<()> {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("service.base_url must not be empty");
    }
    let parsed = url::Url::parse(trimmed)
        .with_context(|| format!("service.base_url {trimmed:?} is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("service.base_url must use http or https, got {:?}", parsed.scheme());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        validate_base_url(base_url)?;
        if anon_key.trim().is_empty() {
            bail!("service.anon_key must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.to_owned(),
            access_token: None,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_access_token(&mut self, token: &str) {
        self.access_token = Some(token.to_owned());
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Returns the authenticated user context, or None when the stored token
    /// is missing, expired, or revoked. Callers treat None as a hard
    /// precondition failure for the list view.
    pub fn current_session(&self) -> Result<Option<Session>> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };

        let response = self
            .authed(self.http.get(format!("{}/auth/v1/user", self.base_url)), token)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let user: UserRow = response.json().context("decode session user")?;
        Ok(Some(Session {
            user_id: UserId::new(user.id),
            email: user.email.unwrap_or_default(),
        }))
    }

    /// Password grant sign-in; mints the bearer token a terminal session
    /// stores in its config.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<SignIn> {
        if email.trim().is_empty() {
            bail!("email must not be empty");
        }

        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let grant: TokenResponse = response.json().context("decode sign-in response")?;
        let expires_at = grant
            .expires_at
            .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok());
        Ok(SignIn {
            access_token: grant.access_token,
            user_id: UserId::new(grant.user.id),
            expires_at,
        })
    }

    /// Full unpaginated fetch, ordered by id descending on the server.
    pub fn list_species(&self) -> Result<Vec<Species>> {
        let token = self.require_token()?;
        let response = self
            .authed(
                self.http.get(format!(
                    "{}/rest/v1/{SPECIES_TABLE}?select=*&order=id.desc",
                    self.base_url
                )),
                token,
            )
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response.json().context("decode species list")
    }

    /// Single insert; the session user is attached as author here, not taken
    /// from form input.
    pub fn insert_species(&self, fields: &SpeciesFields, author: &UserId) -> Result<Species> {
        let token = self.require_token()?;
        let response = self
            .authed(
                self.http
                    .post(format!("{}/rest/v1/{SPECIES_TABLE}", self.base_url))
                    .header("Prefer", "return=representation")
                    .json(&InsertSpecies { fields, author }),
                token,
            )
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        single_row(response, "inserted species")
    }

    /// Single update scoped by record id; author and id are never part of
    /// the patch body.
    pub fn update_species(&self, id: SpeciesId, fields: &SpeciesFields) -> Result<Species> {
        let token = self.require_token()?;
        let response = self
            .authed(
                self.http
                    .patch(format!(
                        "{}/rest/v1/{SPECIES_TABLE}?id=eq.{}",
                        self.base_url,
                        id.get()
                    ))
                    .header("Prefer", "return=representation")
                    .json(fields),
                token,
            )
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        single_row(response, "updated species")
    }

    fn require_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| anyhow!("no access token -- sign in and set service.access_token"))
    }

    fn authed(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {token}"))
    }
}

fn single_row(response: Response, what: &str) -> Result<Species> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(clean_error_response(status, &body));
    }

    let mut rows: Vec<Species> = response
        .json()
        .with_context(|| format!("decode {what}"))?;
    if rows.is_empty() {
        bail!("service returned no {what} row -- the record may not exist or access was denied");
    }
    Ok(rows.remove(0))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [service].base_url and your network ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<RestErrorEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return anyhow!("service error ({}): {}", status.as_u16(), message);
    }

    if let Ok(parsed) = serde_json::from_str::<AuthErrorEnvelope>(body) {
        if let Some(description) = parsed.error_description
            && !description.is_empty()
        {
            return anyhow!("service error ({}): {}", status.as_u16(), description);
        }
        if let Some(msg) = parsed.msg
            && !msg.is_empty()
        {
            return anyhow!("service error ({}): {}", status.as_u16(), msg);
        }
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("service error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("service returned {}", status.as_u16())
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertSpecies<'a> {
    #[serde(flatten)]
    fields: &'a SpeciesFields,
    author: &'a UserId,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_at: Option<i64>,
    user: UserRow,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestErrorEnvelope {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthErrorEnvelope {
    error_description: Option<String>,
    msg: Option<String>,
}
