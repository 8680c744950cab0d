use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::client::{Outcome, RemoteApi, Tally};
use crate::output::RowWriter;

pub const DEFAULT_COUNT: usize = 50;
pub const DEFAULT_PREFIX: &str = "user";
pub const DEFAULT_LAST_NAME: &str = "dummyLastname";
pub const DEFAULT_SITE: &str = "swsdp";
pub const DEFAULT_GROUP: &str = "SiteCollaborator";
pub const EMAIL_DOMAIN: &str = "alfresco.example.org";

/// A generated account before it is turned into a request body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserRecord {
    pub name: String,
    pub last_name: String,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_name: last_name.into(),
        }
    }

    /// Login name as the server stores it; also the email local part and password.
    pub fn username(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Site membership granted to every created user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Membership {
    /// Site short name; `None` creates users without any group.
    pub site: Option<String>,
    pub group: String,
}

impl Default for Membership {
    fn default() -> Self {
        Self {
            site: Some(DEFAULT_SITE.to_owned()),
            group: DEFAULT_GROUP.to_owned(),
        }
    }
}

/// JSON body accepted by the people API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPayload {
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub groups: Vec<String>,
}

impl PersonPayload {
    pub fn new(name: &str, last_name: &str, site: Option<&str>, group: &str) -> Self {
        let username = name.to_lowercase();
        let groups = match site {
            Some(site) if !site.is_empty() => vec![format!("GROUP_site_{}_{}", site, group)],
            _ => Vec::new(),
        };
        Self {
            email: format!("{}@{}", username, EMAIL_DOMAIN),
            password: username.clone(),
            user_name: username,
            first_name: name.to_owned(),
            last_name: last_name.to_owned(),
            groups,
        }
    }

    pub fn from_record(record: &UserRecord, membership: &Membership) -> Self {
        Self::new(
            &record.name,
            &record.last_name,
            membership.site.as_deref(),
            &membership.group,
        )
    }
}

/// Build `count` records named `{prefix}0..{prefix}{count-1}`.
pub fn build_users(count: usize, prefix: &str, last_name: &str) -> Vec<UserRecord> {
    (0..count)
        .map(|idx| UserRecord::new(format!("{}{}", prefix, idx), last_name))
        .collect()
}

/// Create every record and write its username, one row per attempt.
pub fn seed<A, W>(
    api: &A,
    users: &[UserRecord],
    membership: &Membership,
    strict: bool,
    out: &mut RowWriter<W>,
) -> Result<Tally>
where
    A: RemoteApi + ?Sized,
    W: Write,
{
    let mut tally = Tally::default();
    for user in users {
        let payload = PersonPayload::from_record(user, membership);
        debug!(user = %payload.user_name, "creating user");
        let outcome = api
            .create_person(&payload)
            .with_context(|| format!("creating user {}", payload.user_name))?;
        tally.record(outcome, strict, &format!("creating user {}", payload.user_name))?;
        out.write_row(&payload.user_name)?;
    }

    info!(
        users = users.len(),
        failures = tally.failures,
        rows = out.rows(),
        "user seeding finished"
    );
    Ok(tally)
}

/// Remove a previously created user. Not part of the seeding flow.
pub fn delete<A: RemoteApi + ?Sized>(api: &A, user: &UserRecord) -> Result<Outcome> {
    let username = user.username();
    debug!(user = %username, "deleting user");
    api.delete_person(&username)
        .with_context(|| format!("deleting user {}", username))
}
