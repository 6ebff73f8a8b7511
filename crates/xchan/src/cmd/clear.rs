use xchan_process::delete_channel_file;
use xchan_store::channel_path;

use crate::cmd::{ClearArgs, Context};
use crate::exit::{process_error, store_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ClearArgs, ctx: &Context) -> CliResult<i32> {
    let path = channel_path(&ctx.dir, &args.channel)
        .map_err(|err| store_error("invalid channel", err))?;
    let removed = delete_channel_file(&path).map_err(|err| process_error("clear failed", err))?;

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "channel": args.channel,
                "path": path.display().to_string(),
                "removed": removed,
            })
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            if removed {
                println!("removed {}", path.display());
            } else {
                println!("{} does not exist", path.display());
            }
        }
        OutputFormat::Raw => println!("{removed}"),
    }
    Ok(SUCCESS)
}
