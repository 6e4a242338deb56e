//! `fieldmon url`: the stream URL for the resolved target, offline.

use serde::Serialize;

use fieldmon_api::MonitorMode;

use super::Ctx;
use crate::config::Target;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StreamUrl<'a> {
    profile: &'a str,
    mode: MonitorMode,
    url: String,
}

pub fn handle(target: &Target, ctx: &Ctx) -> Result<(), CliError> {
    let url = target
        .origin
        .websocket_url(&target.connection)
        .map_err(|e| CliError::Validation {
            field: "gateway".into(),
            reason: e.to_string(),
        })?;

    let info = StreamUrl {
        profile: &target.profile,
        mode: target.connection.mode(),
        url: url.into(),
    };
    let rendered = output::render_single(ctx.output, &info, |i| i.url.clone())?;
    output::print_output(&rendered, ctx.quiet);
    Ok(())
}
