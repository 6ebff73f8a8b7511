use xchan_codec::{FORMAT_VERSION, HEADER_SIZE};
use xchan_store::DEFAULT_CAPACITY;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("xchan {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        for (field, value) in details() {
            println!("{field}: {value}");
        }
    }
    Ok(SUCCESS)
}

/// Facts two processes must agree on to share a channel.
fn details() -> Vec<(&'static str, String)> {
    vec![
        ("wire_format", FORMAT_VERSION.to_string()),
        ("header_bytes", HEADER_SIZE.to_string()),
        ("default_capacity", DEFAULT_CAPACITY.to_string()),
        (
            "platform",
            format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
        ),
        ("process_support", cfg!(feature = "process").to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_name_the_wire_format() {
        let details = details();
        assert_eq!(details[0], ("wire_format", FORMAT_VERSION.to_string()));
        assert!(details
            .iter()
            .any(|(field, value)| *field == "header_bytes" && value == "8"));
    }
}
