//! `fieldmon write`: send one parameter write and report the gateway's
//! first matching `write_result`.

use serde_json::Value;

use fieldmon_api::{Frame, WriteResultFrame};

use super::{Console, Ctx};
use crate::cli::WriteArgs;
use crate::config::Target;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &WriteArgs, target: &Target, ctx: &Ctx) -> Result<(), CliError> {
    let value = parse_value(&args.value, args.raw);
    let mut console = Console::open(target, ctx);
    console.start(target).await?;
    let result = write(&mut console, args, value, ctx).await;
    console.close();
    result
}

async fn write(
    console: &mut Console,
    args: &WriteArgs,
    value: Value,
    ctx: &Ctx,
) -> Result<(), CliError> {
    console
        .session_mut()
        .write_parameter(&args.parameter, value, args.force)?;

    let parameter = args.parameter.as_str();
    let result = console
        .await_frame("the write result", args.timeout, |frame| match frame {
            Frame::WriteResult(r) if r.parameter == parameter => Some(r),
            _ => None,
        })
        .await?;

    let rendered = output::render_single(ctx.output, &result, detail)?;
    output::print_output(&rendered, ctx.quiet);

    if result.success {
        Ok(())
    } else {
        Err(CliError::WriteRejected {
            parameter: result.parameter,
            message: result
                .message
                .unwrap_or_else(|| "no reason given".into()),
        })
    }
}

/// JSON scalars (`12.5`, `true`, `"on"`) are sent typed; anything else,
/// or everything under `--raw`, is sent as a string.
fn parse_value(input: &str, raw: bool) -> Value {
    if raw {
        return Value::String(input.to_owned());
    }
    match serde_json::from_str::<Value>(input) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::String(_))) => v,
        _ => Value::String(input.to_owned()),
    }
}

fn detail(r: &WriteResultFrame) -> String {
    let shown = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut lines = vec![
        format!("Device:     {}", r.device_id),
        format!("Parameter:  {}", r.parameter),
        format!("Requested:  {}", shown(&r.value)),
    ];
    if let Some(ref new_value) = r.new_value {
        lines.push(format!("New value:  {}", shown(new_value)));
    }
    lines.push(format!(
        "Result:     {}",
        if r.success { "ok" } else { "rejected" }
    ));
    if let Some(ref message) = r.message {
        lines.push(format!("Message:    {message}"));
    }
    lines.join("\n")
}
