use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("cnlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: cnlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CNLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("CNLINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("default_baud: {}", cnlink_transport::DEFAULT_BAUD_RATE);
    println!(
        "features: async={}, cli=true",
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
