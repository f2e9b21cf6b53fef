//! CRUD over the reservations file and the service-owned lease file

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::{ensure_file, read_or_empty};
use crate::entry::{self, LeaseEntry, ReservationEntry};
use crate::error::{Error, Result};
use crate::traits::ServiceReloader;

/// Structured editor for static address reservations
///
/// Update/delete match on MAC+IP+hostname identity rather than line text, so
/// legacy lines with permuted token order still match.
pub struct ReservationEditor {
    path: PathBuf,
    reloader: Arc<dyn ServiceReloader>,
}

impl ReservationEditor {
    pub fn new(path: impl Into<PathBuf>, reloader: Arc<dyn ServiceReloader>) -> Self {
        Self {
            path: path.into(),
            reloader,
        }
    }

    /// All reservations currently in the file, in file order
    pub async fn entries(&self) -> Result<Vec<ReservationEntry>> {
        let blob = read_or_empty(&self.path).await?;
        Ok(blob
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return None;
                }
                let (content, comment) = entry::split_comment(trimmed);
                ReservationEntry::parse_content(content, comment)
            })
            .collect())
    }

    /// Append a reservation, creating the file and parent directories on demand
    pub async fn add(&self, entry: &ReservationEntry) -> Result<()> {
        ensure_file(&self.path).await?;
        let mut blob = tokio::fs::read_to_string(&self.path).await?;
        blob.push('\n');
        blob.push_str(&entry::attach_comment(entry.to_line(), &entry.comment));
        tokio::fs::write(&self.path, blob).await?;

        info!(path = %self.path.display(), mac = %entry.mac_address, "reservation added");
        self.reloader.reload().await
    }

    /// Replace the first reservation matching `old` with the canonical line for `new`
    pub async fn update(&self, old: &ReservationEntry, new: &ReservationEntry) -> Result<()> {
        self.modify(old, Some(new)).await
    }

    /// Remove the first reservation matching `entry`
    pub async fn delete(&self, entry: &ReservationEntry) -> Result<()> {
        self.modify(entry, None).await
    }

    async fn modify(
        &self,
        target: &ReservationEntry,
        new: Option<&ReservationEntry>,
    ) -> Result<()> {
        let blob = tokio::fs::read_to_string(&self.path).await?;

        let mut out: Vec<String> = Vec::new();
        let mut found = false;
        for line in blob.split('\n') {
            if !found {
                let (content, comment) = entry::split_comment(line.trim());
                if let Some(current) = ReservationEntry::parse_content(content, comment) {
                    if current.same_identity(target) {
                        found = true;
                        if let Some(new) = new {
                            out.push(new.to_line());
                        }
                        continue;
                    }
                }
            }
            out.push(line.to_string());
        }

        if !found {
            return Err(Error::not_found(format!(
                "reservation for {} not present in {}",
                target.mac_address,
                self.path.display()
            )));
        }

        tokio::fs::write(&self.path, out.join("\n")).await?;
        info!(path = %self.path.display(), mac = %target.mac_address, "reservation modified");
        self.reloader.reload().await
    }
}

/// Structured editor for the lease file
///
/// The lease file is written by the network service itself, so there is no add
/// operation here; editing a live lease is best-effort and the service may
/// rewrite the file at any time.
pub struct LeaseEditor {
    path: PathBuf,
    reloader: Arc<dyn ServiceReloader>,
}

impl LeaseEditor {
    pub fn new(path: impl Into<PathBuf>, reloader: Arc<dyn ServiceReloader>) -> Self {
        Self {
            path: path.into(),
            reloader,
        }
    }

    /// All leases currently in the file, in file order
    pub async fn entries(&self) -> Result<Vec<LeaseEntry>> {
        let blob = tokio::fs::read_to_string(&self.path).await?;
        Ok(blob.lines().filter_map(LeaseEntry::parse_content).collect())
    }

    /// Rewrite the first lease matching `old` with `new`'s MAC/IP/hostname
    ///
    /// The original expiry and any extra trailing tokens are preserved
    /// positionally; the caller does not supply them.
    pub async fn update(&self, old: &LeaseEntry, new: &LeaseEntry) -> Result<()> {
        let blob = tokio::fs::read_to_string(&self.path).await?;

        let mut out: Vec<String> = Vec::new();
        let mut found = false;
        for line in blob.split('\n') {
            if !found {
                if let Some(current) = LeaseEntry::parse_content(line) {
                    if current.same_identity(old) {
                        found = true;
                        let rewritten = LeaseEntry {
                            mac_address: new.mac_address.clone(),
                            ip_address: new.ip_address.clone(),
                            hostname: new.hostname.clone(),
                            expiry_time: current.expiry_time,
                            extra: current.extra,
                        };
                        out.push(rewritten.to_line());
                        continue;
                    }
                }
            }
            out.push(line.to_string());
        }

        if !found {
            return Err(Error::not_found(format!(
                "lease for {} not present in {}",
                old.mac_address,
                self.path.display()
            )));
        }

        tokio::fs::write(&self.path, out.join("\n")).await?;
        info!(path = %self.path.display(), mac = %old.mac_address, "lease updated");
        self.reloader.reload().await
    }

    /// Remove the first lease matching `entry`
    pub async fn delete(&self, entry: &LeaseEntry) -> Result<()> {
        let blob = tokio::fs::read_to_string(&self.path).await?;

        let mut out: Vec<&str> = Vec::new();
        let mut found = false;
        for line in blob.split('\n') {
            if !found {
                if let Some(current) = LeaseEntry::parse_content(line) {
                    if current.same_identity(entry) {
                        found = true;
                        continue;
                    }
                }
            }
            out.push(line);
        }

        if !found {
            return Err(Error::not_found(format!(
                "lease for {} not present in {}",
                entry.mac_address,
                self.path.display()
            )));
        }

        tokio::fs::write(&self.path, out.join("\n")).await?;
        info!(path = %self.path.display(), mac = %entry.mac_address, "lease deleted");
        self.reloader.reload().await
    }
}
