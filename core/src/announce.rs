//! Advertising that the proxy stands in for a host.
//!
//! The transport (e.g. a service-discovery daemon) sits behind
//! [`Announcer`]; [`Announcement`] tracks whether it has been published.

use std::sync::Arc;

use sleep_proxy_common::config::HostConfig;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("announcing {host}: {reason}")]
pub struct AnnounceError {
    pub host: String,
    pub reason: String,
}

pub trait Announcer: Send + Sync {
    fn publish(&self, host: &HostConfig) -> Result<(), AnnounceError>;
    fn unpublish(&self, host: &HostConfig) -> Result<(), AnnounceError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Publication {
    #[default]
    Unpublished,
    Publishing,
    Published,
}

/// Publication state of one host.
pub struct Announcement {
    announcer: Arc<dyn Announcer>,
    host: HostConfig,
    state: Publication,
}

impl Announcement {
    pub fn new(announcer: Arc<dyn Announcer>, host: HostConfig) -> Self {
        Self {
            announcer,
            host,
            state: Publication::Unpublished,
        }
    }

    pub fn state(&self) -> Publication {
        self.state
    }

    /// Publishes once; further calls are no-ops until [`unpublish`](Self::unpublish).
    pub fn publish(&mut self) -> Result<(), AnnounceError> {
        if self.state != Publication::Unpublished {
            return Ok(());
        }
        self.state = Publication::Publishing;
        match self.announcer.publish(&self.host) {
            Ok(()) => {
                self.state = Publication::Published;
                Ok(())
            }
            Err(err) => {
                self.state = Publication::Unpublished;
                Err(err)
            }
        }
    }

    pub fn unpublish(&mut self) {
        if self.state == Publication::Unpublished {
            return;
        }
        if let Err(err) = self.announcer.unpublish(&self.host) {
            warn!("{err}");
        }
        self.state = Publication::Unpublished;
    }
}

/// Announces through the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn publish(&self, host: &HostConfig) -> Result<(), AnnounceError> {
        info!(host = %host.label(), "standing in for ports {}", host.ports);
        Ok(())
    }

    fn unpublish(&self, host: &HostConfig) -> Result<(), AnnounceError> {
        info!(host = %host.label(), "no longer standing in");
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
