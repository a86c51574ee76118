//! lagwatch - live event handler latency monitor

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use lagwatch_cli::demo::{self, HostTicker};
use lagwatch_cli::{ChannelObserver, Cli, CommandSender, LagMonitor, ObserverDirectory};
use lagwatch_cli::{Observer, OperatorCommand};
use lagwatch_core::WatchController;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let resolved = lagwatch_config::resolve_config(cli.config.as_deref())?;
    lagwatch_telemetry::init_subscriber(&resolved.config.telemetry)
        .context("Failed to initialize logging")?;
    match &resolved.path {
        Some(path) => tracing::info!(path = %path.display(), "loaded configuration"),
        None => tracing::info!("no configuration file found, using defaults"),
    }

    let host = &resolved.config.host;
    let table = demo::build_host(host)?;
    let observers = Arc::new(ObserverDirectory::new());
    let monitor = LagMonitor::new(WatchController::new(table.clone()), observers.clone());

    let (sender, mut notifications) = if cli.observer {
        let (tx, rx) = unbounded_channel();
        let observer = Arc::new(ChannelObserver::new(tx));
        let sender = CommandSender::Observer(observer.id());
        observers.connect(observer);
        (sender, Some(rx))
    } else {
        (CommandSender::Console, None)
    };

    let tick = Duration::from_millis(cli.tick_ms.unwrap_or(host.tick_ms).max(1));
    let ticker = HostTicker::spawn(table, tick)?;

    println!(
        "{} {} owners, tick {} ms. Type {} for commands.",
        "lagwatch".cyan().bold(),
        host.owners.len(),
        tick.as_millis(),
        "help".bold()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read command")? else {
                    break;
                };
                if matches!(line.trim(), "quit" | "exit") {
                    break;
                }
                handle_line(&monitor, &sender, &line);
            }
            Some(message) = next_notification(&mut notifications) => {
                println!("{}", message.magenta());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ticker.stop();
    monitor.shutdown();
    println!("{}", "Stopped.".dimmed());
    Ok(())
}

fn handle_line(monitor: &LagMonitor, sender: &CommandSender, line: &str) {
    let reply = OperatorCommand::parse_line(line)
        .and_then(|command| command.map(|c| monitor.execute(sender, c)).transpose());
    match reply {
        Ok(Some(message)) => println!("{}", message.yellow()),
        Ok(None) => {}
        Err(e) => println!("{}", e.to_string().red()),
    }
}

async fn next_notification(rx: &mut Option<UnboundedReceiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
