//! `fieldmon watch`: stream readings until Ctrl-C, `--count`, or the
//! gateway ends the session.

use std::time::Duration;

use tabled::Tabled;
use tracing::info;

use fieldmon_api::{DataFrame, Frame};
use fieldmon_core::{DeviceSnapshot, SessionStatus};

use super::{Console, Ctx};
use crate::cli::{OutputFormat, WatchArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

// ── Table row ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Parameter")]
    parameter: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Quality")]
    quality: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn snapshot_rows(snap: &DeviceSnapshot) -> Vec<ReadingRow> {
    snap.readings()
        .into_iter()
        .map(|(name, reading)| ReadingRow {
            device: snap.device_id.clone(),
            parameter: name.to_owned(),
            value: reading.display_value(),
            quality: reading.quality.unwrap_or_else(|| "-".into()),
            updated: reading.timestamp.unwrap_or_else(|| snap.timestamp.clone()),
        })
        .collect()
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: &WatchArgs, target: &Target, ctx: &Ctx) -> Result<(), CliError> {
    let mut console = Console::open(target, ctx);
    console.start(target).await?;
    let result = stream(&mut console, args, target, ctx).await;
    console.close();
    result
}

async fn stream(
    console: &mut Console,
    args: &WatchArgs,
    target: &Target,
    ctx: &Ctx,
) -> Result<(), CliError> {
    // After an unexpected close the transport retries once; give it the
    // reconnect delay plus a handshake window before giving up.
    let grace = target.options.reconnect_delay + Duration::from_secs(ctx.handshake_timeout);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut frames = 0_u64;

    loop {
        let disconnected = console.session().status() == SessionStatus::Disconnected;
        let frame = tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                return Ok(());
            }
            () = tokio::time::sleep(grace), if disconnected => return Err(console.ended()),
            frame = console.next_frame() => frame?,
        };

        if console.session().status() == SessionStatus::Errored {
            return Err(console.ended());
        }

        if let Some(Frame::Data(data)) = frame {
            if !args.events_only {
                print_readings(console, &data, ctx)?;
            }
            frames += 1;
            if args.count.is_some_and(|limit| frames >= limit) {
                return Ok(());
            }
        }
    }
}

/// Print the snapshots a data frame just replaced.
fn print_readings(console: &Console, data: &DataFrame, ctx: &Ctx) -> Result<(), CliError> {
    let store = console.store();
    let snapshots: Vec<DeviceSnapshot> = data
        .device_ids()
        .into_iter()
        .filter_map(|id| store.snapshot(id))
        .map(|snap| (*snap).clone())
        .collect();
    if snapshots.is_empty() {
        return Ok(());
    }

    // JSON lines: one document per device so the stream stays parseable.
    if ctx.output == OutputFormat::JsonCompact {
        for snap in &snapshots {
            output::print_output(&output::render_json(snap, true)?, ctx.quiet);
        }
        return Ok(());
    }

    let rendered = output::render_list(ctx.output, &snapshots, snapshot_rows)?;
    output::print_output(&rendered, ctx.quiet);
    Ok(())
}
