//! Append-only audit trail of structural snapshot changes.
//!
//! Events are never updated or removed. Reads return them in append order.

use crate::errors::Result;
use crate::storage::TrustStorage;
use std::sync::Arc;
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::model::{AuditEvent, AuditEventType};
use trustsnap_core::version::Version;

/// Thin handle over the audit collection of a [`TrustStorage`].
#[derive(Clone)]
pub struct AuditLog {
    storage: Arc<dyn TrustStorage>,
}

impl AuditLog {
    pub fn new(storage: Arc<dyn TrustStorage>) -> Self {
        Self { storage }
    }

    /// Append one event.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if actor, role or reason is blank
    /// - `Persistence` if the backend rejects the write
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        for (field, value) in [
            ("actor", &event.actor),
            ("role", &event.role),
            ("reason", &event.reason),
        ] {
            if value.trim().is_empty() {
                return Err(ExError::new(ExErrorKind::InvalidInput)
                    .with_op("audit_append")
                    .with_version(event.version)
                    .with_message(format!("audit event {} must not be empty", field)));
            }
        }

        self.storage.append_audit(event)?;
        tracing::debug!(
            event = %event.event,
            version = %event.version,
            actor = %event.actor,
            "Appended audit event"
        );
        Ok(())
    }

    /// Every event, oldest first.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn list_all(&self) -> Result<Vec<AuditEvent>> {
        self.storage.list_audit()
    }

    /// Events recorded against one version, oldest first.
    ///
    /// # Errors
    ///
    /// As [`AuditLog::list_all`].
    pub fn list_for_version(&self, version: &Version) -> Result<Vec<AuditEvent>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| &e.version == version)
            .collect())
    }

    /// Events of one kind, oldest first.
    ///
    /// # Errors
    ///
    /// As [`AuditLog::list_all`].
    pub fn list_by_event(&self, event: AuditEventType) -> Result<Vec<AuditEvent>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| e.event == event)
            .collect())
    }
}
