use xchan_process::remote;
use xchan_store::MappedStore;

use crate::cmd::{Context, RemoteArgs};
use crate::exit::CliResult;
use crate::tasks::builtin_registry;

pub fn run(args: RemoteArgs, ctx: &Context) -> CliResult<i32> {
    let registry = builtin_registry::<MappedStore>();
    Ok(remote::run(
        &args.channel,
        &args.entry,
        ctx.channel_config(),
        &registry,
    ))
}
