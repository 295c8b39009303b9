//! Console: drive a local mesh from stdin.
//!
//! Each input line is `<topic> <json>`. The JSON is only checked for syntax,
//! so payloads the agents will reject can be fed to the mesh deliberately. Every envelope
//! seen on `tinywins/>` is echoed to stdout, including the console's own.
//!
//! Runs on its own bus session so it looks like any other mesh client.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusError, BusSession};
use crate::topics::ALL_TOPICS;

/// Split a console line into topic and JSON payload.
pub fn parse_line(line: &str) -> Result<(&str, serde_json::Value), String> {
    let line = line.trim();
    let (topic, json) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected `<topic> <json>`".to_string())?;
    let payload = serde_json::from_str(json.trim()).map_err(|e| format!("invalid JSON: {e}"))?;
    Ok((topic, payload))
}

/// Run until `shutdown` is cancelled or `input` reaches EOF.
pub async fn run<R>(mut session: BusSession, input: R, shutdown: CancellationToken) -> Result<(), BusError>
where
    R: AsyncBufRead + Unpin,
{
    session.subscribe(ALL_TOPICS).await?;
    let handle = session.handle();

    if let Some(mut inbound) = session.take_inbound() {
        let observer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = observer_shutdown.cancelled() => break,
                    envelope = inbound.recv() => match envelope {
                        Some(envelope) => println!(
                            "[{}] {}",
                            envelope.topic,
                            String::from_utf8_lossy(&envelope.payload)
                        ),
                        None => break,
                    },
                }
            }
        });
    }

    info!("console ready: enter `<topic> <json>` lines, Ctrl-C to quit");
    let mut lines = input.lines();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console input closed");
                        break;
                    }
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_line(&line) {
                            Ok((topic, payload)) => match handle.publish(topic, &payload) {
                                Ok(()) => debug!(%topic, "console published"),
                                Err(e) => eprintln!("publish failed: {e}"),
                            },
                            Err(e) => eprintln!("{e}"),
                        }
                    }
                }
            }
        }
    }

    session.close().await;
    Ok(())
}
