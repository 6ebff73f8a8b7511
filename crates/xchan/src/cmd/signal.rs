use tracing::info;

use crate::cmd::{Context, SignalArgs, SignalKind};
use crate::exit::{channel_error, CliResult, SUCCESS};

pub fn run(args: SignalArgs, ctx: &Context) -> CliResult<i32> {
    let channel = ctx.open(&args.channel)?;
    let result = match args.signal {
        SignalKind::Shutdown => channel.signal_shutdown(),
        SignalKind::Terminate => channel.signal_terminate(),
    };
    result.map_err(|err| channel_error("signal failed", err))?;
    info!(channel = %args.channel, signal = ?args.signal, "signal written");
    Ok(SUCCESS)
}
