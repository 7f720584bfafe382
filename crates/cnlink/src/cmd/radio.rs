use cnlink_protocol::Protocol;

use crate::cmd::RadioArgs;
use crate::exit::{command_error, CliResult, SUCCESS};
use crate::output::{print_command_ok, OutputFormat};

pub fn run(args: RadioArgs, format: OutputFormat) -> CliResult<i32> {
    let config = if args.stop { None } else { args.radio_config()? };

    let protocol = Protocol::new(args.device.open()?);
    protocol
        .configure_radio(config.as_ref())
        .map_err(command_error)?;

    let command = if config.is_some() { "radio" } else { "radio-stop" };
    print_command_ok(command, &args.device.device(), format);
    Ok(SUCCESS)
}
