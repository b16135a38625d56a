//! Build farm host registered by an owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A machine that uploads build results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub platform: Option<String>,
    pub owner: Option<String>,
    pub owner_email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub permission: Option<String>,
    pub ssh_access: bool,
    pub fqdn: Option<String>,
    pub join_time: Option<DateTime<Utc>>,
    pub last_dead_mail: Option<DateTime<Utc>>,
    /// Upload time of the newest archived build, when queried with build data.
    pub last_update: Option<DateTime<Utc>>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: None,
            owner: None,
            owner_email: None,
            password: None,
            permission: None,
            ssh_access: false,
            fqdn: None,
            join_time: None,
            last_dead_mail: None,
            last_update: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>, email: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.owner_email = Some(email.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// `(owner, email)` when an owner is recorded.
    pub fn owner_contact(&self) -> Option<(&str, &str)> {
        self.owner
            .as_deref()
            .map(|owner| (owner, self.owner_email.as_deref().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_simple() {
        let host = Host::new("foo");
        assert_eq!(host.name, "foo");
        assert_eq!(host.owner_contact(), None);
    }

    #[test]
    fn test_create_with_owner() {
        let host = Host::new("foo").with_owner("Jelmer", "jelmer@samba.org");
        assert_eq!(host.owner_contact(), Some(("Jelmer", "jelmer@samba.org")));
    }
}
