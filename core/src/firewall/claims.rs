use std::sync::Arc;

use sleep_proxy_common::network::{NetworkAddress, PortSet};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use super::{Action, Firewall, FirewallError, FirewallRule, claim_rules};

/// Rules applied on behalf of one session.
///
/// Only rules whose insertion succeeded are remembered. They are deleted in
/// reverse order by [`Claims::release`] or, failing that, on drop. Errors
/// while deleting are logged and otherwise ignored.
///
/// Firewall commands block until their subprocess exits. On a multi-threaded
/// tokio runtime they run through [`tokio::task::block_in_place`] so the
/// worker's other tasks move to another thread meanwhile.
pub struct Claims {
    firewall: Arc<dyn Firewall>,
    applied: Vec<FirewallRule>,
}

impl Claims {
    pub fn new(firewall: Arc<dyn Firewall>) -> Self {
        Self {
            firewall,
            applied: Vec::new(),
        }
    }

    /// Claims every address in order. On error everything claimed so far is
    /// released before the error is returned.
    pub fn acquire(
        firewall: Arc<dyn Firewall>,
        interface: &str,
        addresses: &[NetworkAddress],
        ports: &PortSet,
    ) -> Result<Self, FirewallError> {
        let mut claims = Self::new(firewall);
        for address in addresses {
            claims.claim(interface, address, ports)?;
        }
        Ok(claims)
    }

    pub fn claim(
        &mut self,
        interface: &str,
        address: &NetworkAddress,
        ports: &PortSet,
    ) -> Result<(), FirewallError> {
        for rule in claim_rules(interface, address, ports) {
            self.insert(rule)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, rule: FirewallRule) -> Result<(), FirewallError> {
        self.execute(Action::Insert, &rule)?;
        debug!("inserted {rule}");
        self.applied.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[FirewallRule] {
        &self.applied
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn release(mut self) {
        self.release_all();
    }

    fn execute(&self, action: Action, rule: &FirewallRule) -> Result<(), FirewallError> {
        let run = || self.firewall.execute(action, rule);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(run)
            }
            _ => run(),
        }
    }

    fn release_all(&mut self) {
        while let Some(rule) = self.applied.pop() {
            match self.execute(Action::Delete, &rule) {
                Ok(()) => debug!("deleted {rule}"),
                Err(err) => warn!("could not delete {rule}: {err}"),
            }
        }
    }
}

impl Drop for Claims {
    fn drop(&mut self) {
        self.release_all();
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
