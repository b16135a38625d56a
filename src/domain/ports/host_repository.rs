//! Host registry port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::Host;

/// Repository interface for the host registry.
#[async_trait]
pub trait HostRepository: Send + Sync {
    /// Register a new host. Fails with `HostAlreadyExists` on a duplicate name.
    async fn create_host(&self, host: &Host) -> DomainResult<()>;

    /// Remove a host. Fails with `NoSuchHost` when absent.
    async fn delete_host(&self, name: &str) -> DomainResult<()>;

    /// All hosts, ordered by name.
    async fn hosts(&self) -> DomainResult<Vec<Host>>;

    /// Look up a single host.
    async fn host(&self, name: &str) -> DomainResult<Option<Host>>;

    async fn host_exists(&self, name: &str) -> DomainResult<bool> {
        Ok(self.host(name).await?.is_some())
    }

    async fn update_platform(&self, name: &str, platform: &str) -> DomainResult<()>;

    async fn update_owner(&self, name: &str, owner: &str, owner_email: &str) -> DomainResult<()>;

    /// Hosts that have not uploaded, joined or been mailed within `age`.
    async fn dead_hosts(&self, age: Duration) -> DomainResult<Vec<Host>>;

    /// Every host with the upload time of its newest archived build.
    async fn host_ages(&self) -> DomainResult<Vec<Host>>;

    /// Record that the owner was told the host looks dead.
    async fn sent_dead_mail(&self, name: &str) -> DomainResult<()>;
}
