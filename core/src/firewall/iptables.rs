use std::net::IpAddr;
use std::process::Command;

use tracing::{debug, warn};

use super::{Action, Firewall, FirewallError, FirewallRule};

/// Runs `ip` and `iptables`/`ip6tables` for every rule change.
#[derive(Debug, Clone, Copy, Default)]
pub struct IptablesFirewall;

impl IptablesFirewall {
    pub fn new() -> Self {
        Self
    }

    /// The command lines for one rule change, in execution order.
    pub fn commands(action: Action, rule: &FirewallRule) -> Vec<Vec<String>> {
        match rule {
            FirewallRule::Address { interface, address } => {
                let verb = match action {
                    Action::Insert => "add",
                    Action::Delete => "del",
                };
                vec![to_args(&["ip", "addr", verb, &address.to_string(), "dev", interface])]
            }
            FirewallRule::DropTcpReset { source } => {
                let ip = source.to_string();
                vec![iptables(action, *source, &[
                    "OUTPUT", "-s", &ip, "-p", "tcp", "--tcp-flags", "ALL", "RST,ACK", "-j", "DROP",
                ])]
            }
            FirewallRule::OpenPorts { destination, ports } => {
                let ip = destination.to_string();
                let mut commands: Vec<Vec<String>> = ports
                    .iter()
                    .map(|port| {
                        let port = port.to_string();
                        iptables(action, *destination, &[
                            "INPUT", "-d", &ip, "-p", "tcp", "--syn", "--dport", &port, "-j", "ACCEPT",
                        ])
                    })
                    .collect();
                for protocol in ["tcp", "udp"] {
                    commands.push(iptables(action, *destination, &[
                        "INPUT", "-d", &ip, "-p", protocol, "-j", "REJECT",
                    ]));
                }
                // -I prepends, so insert backwards to end up in listed order.
                if action == Action::Insert {
                    commands.reverse();
                }
                commands
            }
            FirewallRule::BlockIcmpUnreachable { destination } => {
                let ip = destination.to_string();
                let (protocol, type_flag) = match destination {
                    IpAddr::V4(_) => ("icmp", "--icmp-type"),
                    IpAddr::V6(_) => ("icmpv6", "--icmpv6-type"),
                };
                vec![iptables(action, *destination, &[
                    "OUTPUT", "-d", &ip, "-p", protocol, type_flag, "destination-unreachable", "-j", "DROP",
                ])]
            }
        }
    }
}

impl Firewall for IptablesFirewall {
    fn execute(&self, action: Action, rule: &FirewallRule) -> Result<(), FirewallError> {
        let commands = Self::commands(action, rule);
        for (idx, command) in commands.iter().enumerate() {
            if let Err(err) = run(command) {
                // Leave no half applied rule behind.
                for done in commands[..idx].iter().rev() {
                    if let Err(undo_err) = run(&inverse(done)) {
                        warn!("could not undo `{}`: {undo_err}", done.join(" "));
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

fn to_args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn iptables(action: Action, family_of: IpAddr, rest: &[&str]) -> Vec<String> {
    let program = match family_of {
        IpAddr::V4(_) => "iptables",
        IpAddr::V6(_) => "ip6tables",
    };
    let flag = match action {
        Action::Insert => "-I",
        Action::Delete => "-D",
    };
    let mut args = to_args(&[program, "-w", flag]);
    args.extend(to_args(rest));
    args
}

/// The command undoing `command`.
fn inverse(command: &[String]) -> Vec<String> {
    command
        .iter()
        .map(|arg| match arg.as_str() {
            "-I" => "-D".to_string(),
            "-D" => "-I".to_string(),
            "add" => "del".to_string(),
            "del" => "add".to_string(),
            _ => arg.clone(),
        })
        .collect()
}

fn run(command: &[String]) -> Result<(), FirewallError> {
    let line = command.join(" ");
    debug!("running `{line}`");
    let Some((program, args)) = command.split_first() else {
        return Ok(());
    };
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| FirewallError::Spawn {
            command: line.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(FirewallError::CommandFailed {
            command: line,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
