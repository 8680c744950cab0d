//! In-memory [`RemoteApi`] used by the seeder tests.

use std::cell::{Cell, RefCell};

use anyhow::{Result, bail};

use crate::client::{Outcome, RemoteApi};
use crate::users::PersonPayload;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    MakeCollection(String),
    CreatePerson(PersonPayload),
    DeletePerson(String),
}

/// Records every call and answers with a fixed status.
pub struct RecordingApi {
    status: u16,
    fail_after: Option<usize>,
    calls: RefCell<Vec<Call>>,
    attempts: Cell<usize>,
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self::responding(200)
    }
}

impl RecordingApi {
    pub fn responding(status: u16) -> Self {
        Self {
            status,
            fail_after: None,
            calls: RefCell::new(Vec::new()),
            attempts: Cell::new(0),
        }
    }

    /// Succeeds `successes` times, then behaves like a refused connection.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::responding(201)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn answer(&self, call: Call) -> Result<Outcome> {
        let attempt = self.attempts.get();
        self.attempts.set(attempt + 1);
        if self.fail_after.is_some_and(|limit| attempt >= limit) {
            bail!("connection refused");
        }
        self.calls.borrow_mut().push(call);
        Ok(Outcome::Status(self.status))
    }
}

impl RemoteApi for RecordingApi {
    fn make_collection(&self, path: &str) -> Result<Outcome> {
        self.answer(Call::MakeCollection(path.to_owned()))
    }

    fn create_person(&self, person: &PersonPayload) -> Result<Outcome> {
        self.answer(Call::CreatePerson(person.clone()))
    }

    fn delete_person(&self, username: &str) -> Result<Outcome> {
        self.answer(Call::DeletePerson(username.to_owned()))
    }
}
