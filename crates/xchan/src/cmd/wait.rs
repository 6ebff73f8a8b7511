use xchan_codec::Table;

use crate::cmd::{parse_duration, Context, WaitArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::print_entries;

pub fn get(args: WaitArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let channel = ctx.open(&args.channel)?;
    let table = channel
        .get(args.keys.iter().cloned(), timeout)
        .map_err(|err| channel_error("get failed", err))?;
    print_table(&args, &table, ctx);
    Ok(SUCCESS)
}

pub fn remove(args: WaitArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let channel = ctx.open(&args.channel)?;
    let table = channel
        .remove(args.keys.iter().cloned(), timeout)
        .map_err(|err| channel_error("remove failed", err))?;
    print_table(&args, &table, ctx);
    Ok(SUCCESS)
}

/// Print in the order the keys were requested.
fn print_table(args: &WaitArgs, table: &Table, ctx: &Context) {
    let mut seen = std::collections::BTreeSet::new();
    let entries = args
        .keys
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .map(|key| (key.as_str(), table.get(key)));
    print_entries(&args.channel, entries, ctx.format);
}
