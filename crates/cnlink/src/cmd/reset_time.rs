use cnlink_protocol::Protocol;

use crate::cmd::DeviceArgs;
use crate::exit::{command_error, CliResult, SUCCESS};
use crate::output::{print_command_ok, OutputFormat};

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let protocol = Protocol::new(args.open()?);
    protocol.reset_time().map_err(command_error)?;
    print_command_ok("reset-time", &args.device(), format);
    Ok(SUCCESS)
}
