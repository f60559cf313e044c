use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{Action, Firewall, FirewallError, FirewallRule, RuleKind};

/// In-memory firewall keeping every call and the resulting rule set.
///
/// Deleting a rule that is not applied fails, like it does with iptables.
#[derive(Debug, Default)]
pub struct RecordingFirewall {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<(Action, FirewallRule)>,
    applied: Vec<FirewallRule>,
    fail_on: Option<(Action, RuleKind)>,
}

impl RecordingFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every `action` on rules of `kind`.
    pub fn failing_on(action: Action, kind: RuleKind) -> Self {
        let firewall = Self::default();
        firewall.lock().fail_on = Some((action, kind));
        firewall
    }

    pub fn calls(&self) -> Vec<(Action, FirewallRule)> {
        self.lock().calls.clone()
    }

    pub fn applied(&self) -> Vec<FirewallRule> {
        self.lock().applied.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Firewall for RecordingFirewall {
    fn execute(&self, action: Action, rule: &FirewallRule) -> Result<(), FirewallError> {
        trace!("{action} {rule}");
        let mut state = self.lock();
        state.calls.push((action, rule.clone()));

        let rejected = || FirewallError::Rejected {
            action,
            rule: rule.clone(),
        };
        if state.fail_on == Some((action, rule.kind())) {
            return Err(rejected());
        }
        match action {
            Action::Insert => state.applied.push(rule.clone()),
            Action::Delete => {
                let idx = state
                    .applied
                    .iter()
                    .rposition(|applied| applied == rule)
                    .ok_or_else(rejected)?;
                state.applied.remove(idx);
            }
        }
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
