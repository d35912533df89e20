//! Author identities.

use std::collections::BTreeMap;

use serde::Serialize;

/// A user known to the host directory.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Identity {
    /// Login.
    pub login: String,
    /// Display name.
    pub name: Option<String>,
    /// Company.
    pub company: Option<String>,
}

impl Identity {
    /// An identity carrying only a login, used for users the directory does
    /// not know.
    #[must_use]
    pub fn placeholder(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            name: None,
            company: None,
        }
    }
}

/// User directory of the host application.
pub trait IdentityDirectory: Send + Sync {
    /// Finds the user with `login`.
    fn find_by_login(&self, login: &str) -> Option<Identity>;

    /// Finds the user with `login`, or returns a placeholder.
    fn resolve(&self, login: &str) -> Identity {
        self.find_by_login(login)
            .unwrap_or_else(|| Identity::placeholder(login))
    }
}

impl IdentityDirectory for BTreeMap<String, Identity> {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        self.get(login).cloned()
    }
}
