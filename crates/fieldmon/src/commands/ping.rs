//! `fieldmon ping`: round-trip latency through the gateway's `pong`.

use chrono::Utc;
use serde::Serialize;
use tabled::Tabled;

use fieldmon_api::Frame;

use super::{Console, Ctx};
use crate::cli::PingArgs;
use crate::config::Target;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Serialize, Tabled)]
struct PingReply {
    #[tabled(rename = "Seq")]
    seq: u32,
    #[tabled(rename = "RTT (ms)")]
    rtt_ms: i64,
}

pub async fn handle(args: &PingArgs, target: &Target, ctx: &Ctx) -> Result<(), CliError> {
    let mut console = Console::open(target, ctx);
    console.start(target).await?;
    let result = ping(&mut console, args).await;
    console.close();

    let replies = result?;
    let rendered = output::render_list(ctx.output, &replies, |r| vec![r.clone()])?;
    output::print_output(&rendered, ctx.quiet);
    Ok(())
}

async fn ping(console: &mut Console, args: &PingArgs) -> Result<Vec<PingReply>, CliError> {
    let count = args.count.max(1);
    let mut replies = Vec::new();
    for seq in 1..=count {
        let command = console.session_mut().send_ping()?;
        let sent_at = command
            .sent_at()
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        // Pongs are not correlated with pings; the first one after this
        // send closes the round trip, even one owed to a heartbeat.
        console
            .await_frame("a pong", args.timeout, |frame| {
                matches!(frame, Frame::Pong).then_some(())
            })
            .await?;

        let rtt_ms = (Utc::now().timestamp_millis() - sent_at).max(0);
        tracing::debug!(seq, rtt_ms, "pong received");
        replies.push(PingReply { seq, rtt_ms });
    }
    Ok(replies)
}
