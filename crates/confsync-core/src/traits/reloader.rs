// # Service Reloader Trait
//
// The process-control collaborator. The network service that owns the tracked
// files must be told to re-read them after every successful local-content
// mutation, whether CRUD-driven or sync-driven.
//
// The actual mechanism (signalling via a supervisor, a management socket, ...)
// is outside this crate; the daemon wires in a concrete implementation.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for service reload implementations
///
/// A reload failure is reported to the caller but never rolls back the file
/// mutation that preceded it.
#[async_trait]
pub trait ServiceReloader: Send + Sync {
    /// Signal the network service to reload its configuration
    async fn reload(&self) -> Result<()>;
}

/// Reloader that only logs; used where no service is running (tests, tooling)
#[derive(Debug, Default)]
pub struct NoopReloader;

#[async_trait]
impl ServiceReloader for NoopReloader {
    async fn reload(&self) -> Result<()> {
        tracing::debug!("reload requested (noop reloader)");
        Ok(())
    }
}
