use xchan_codec::encoded_len;
use xchan_protocol::is_control_key;
use xchan_store::SnapshotStore;

use crate::cmd::{Context, InspectArgs};
use crate::exit::{channel_error, codec_error, CliResult, SUCCESS};
use crate::output::{print_inspect, EntrySummary, InspectOutput};

pub fn run(args: InspectArgs, ctx: &Context) -> CliResult<i32> {
    let channel = ctx.open(&args.channel)?;
    let table = channel
        .snapshot()
        .map_err(|err| channel_error("inspect failed", err))?;

    let entries: Vec<EntrySummary> = table
        .iter()
        .map(|(key, value)| EntrySummary {
            key: key.clone(),
            kind: value.kind(),
            size: value.to_string().len(),
            control: is_control_key(key),
        })
        .collect();
    let used = if table.is_empty() {
        0
    } else {
        encoded_len(&table).map_err(|err| codec_error("inspect failed", err))?
    };

    let output = InspectOutput {
        channel: &args.channel,
        path: channel.path().display().to_string(),
        capacity: channel.store().capacity(),
        used,
        entries: &entries,
    };
    print_inspect(&output, ctx.format);
    Ok(SUCCESS)
}
