mod commands;
mod terminal;

use std::time::Duration;

use commands::{CommandLine, Commands, emulate, wake, watch};
use terminal::{logging, print};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbose);
    print::banner();

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(token.clone()));

    let result = match commands.command {
        Commands::Watch { host, wake, poll_ms } => {
            print::header("watching");
            watch::watch(&host, &wake, Duration::from_millis(poll_ms), token).await
        }
        Commands::Emulate { host, wake } => {
            print::header("emulating");
            emulate::emulate(&host, &wake, token).await
        }
        Commands::Wake { mac, interface, wake_port } => {
            print::header("waking");
            wake::wake(mac, interface, wake_port).await
        }
    };
    print::end_of_program();
    result
}

async fn cancel_on_shutdown(token: CancellationToken) {
    wait_for_shutdown_signal().await;
    warn!("shutdown requested, finishing the current step");
    token.cancel();
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
            return;
        }
    }

    let _ = tokio::signal::ctrl_c().await;
}
