use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::config::SeedConfig;
use crate::users::PersonPayload;

const WEBDAV_SHARED_PATH: &str = "/alfresco/webdav/Shared/";
const PEOPLE_PATH: &str = "/alfresco/s/api/people";

/// Result of a single remote call as far as the seeders care.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Status(u16),
    /// Nothing was sent (dry-run).
    Skipped,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Status(code) => (200..300).contains(code),
            Outcome::Skipped => true,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Status(code) => write!(f, "{}", code),
            Outcome::Skipped => f.write_str("skipped (dry-run)"),
        }
    }
}

/// Running totals for one seeding run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Tally {
    pub requests: usize,
    pub failures: usize,
}

impl Tally {
    /// Print the status of a finished call and count it.
    ///
    /// Non-2xx responses only abort the run when `strict` is set.
    pub fn record(&mut self, outcome: Outcome, strict: bool, what: &str) -> Result<()> {
        println!("{}", outcome);
        self.requests += 1;
        if outcome.is_success() {
            return Ok(());
        }
        self.failures += 1;
        warn!(status = %outcome, "{} was not accepted", what);
        if strict {
            bail!("{} returned status {}", what, outcome);
        }
        Ok(())
    }
}

/// The remote operations the seeders need.
pub trait RemoteApi {
    /// Create a WebDAV collection at `path`, relative to the shared space.
    fn make_collection(&self, path: &str) -> Result<Outcome>;
    fn create_person(&self, person: &PersonPayload) -> Result<Outcome>;
    fn delete_person(&self, username: &str) -> Result<Outcome>;
}

pub fn collection_url(base_url: &str, path: &str) -> String {
    format!("{}{}{}", base_url, WEBDAV_SHARED_PATH, path)
}

pub fn people_url(base_url: &str) -> String {
    format!("{}{}", base_url, PEOPLE_PATH)
}

pub fn person_url(base_url: &str, username: &str) -> String {
    format!("{}/{}", people_url(base_url), username)
}

/// Blocking HTTP implementation authenticating every request as the admin user.
pub struct HttpApi {
    client: Client,
    config: SeedConfig,
    mkcol: Method,
}

impl HttpApi {
    pub fn new(config: &SeedConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("building HTTP client")?;
        let mkcol = Method::from_bytes(b"MKCOL").map_err(|e| anyhow!("invalid method: {e}"))?;
        Ok(Self {
            client,
            config: config.clone(),
            mkcol,
        })
    }

    fn authed(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.config.admin_user, Some(&self.config.admin_pwd))
    }

    fn send(&self, request: RequestBuilder, what: &str, url: &str) -> Result<Outcome> {
        let response = request
            .send()
            .with_context(|| format!("{} {} failed", what, url))?;
        let status = response.status().as_u16();
        debug!(%url, status, "{} completed", what);
        Ok(Outcome::Status(status))
    }
}

impl RemoteApi for HttpApi {
    fn make_collection(&self, path: &str) -> Result<Outcome> {
        let url = collection_url(&self.config.base_url, path);
        self.send(self.authed(self.mkcol.clone(), &url), "MKCOL", &url)
    }

    fn create_person(&self, person: &PersonPayload) -> Result<Outcome> {
        let url = people_url(&self.config.base_url);
        self.send(self.authed(Method::POST, &url).json(person), "POST", &url)
    }

    fn delete_person(&self, username: &str) -> Result<Outcome> {
        let url = person_url(&self.config.base_url, username);
        self.send(self.authed(Method::DELETE, &url), "DELETE", &url)
    }
}

/// Logs what would be sent without touching the network.
pub struct DryRunApi {
    base_url: String,
}

impl DryRunApi {
    pub fn new(config: &SeedConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
        }
    }
}

impl RemoteApi for DryRunApi {
    fn make_collection(&self, path: &str) -> Result<Outcome> {
        println!("[dry-run] MKCOL {}", collection_url(&self.base_url, path));
        Ok(Outcome::Skipped)
    }

    fn create_person(&self, person: &PersonPayload) -> Result<Outcome> {
        let body = serde_json::to_string(person).context("serializing person payload")?;
        println!("[dry-run] POST {} {}", people_url(&self.base_url), body);
        Ok(Outcome::Skipped)
    }

    fn delete_person(&self, username: &str) -> Result<Outcome> {
        println!("[dry-run] DELETE {}", person_url(&self.base_url, username));
        Ok(Outcome::Skipped)
    }
}
