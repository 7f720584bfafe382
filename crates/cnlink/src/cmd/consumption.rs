use cnlink_protocol::Protocol;

use crate::cmd::ConsumptionArgs;
use crate::exit::{command_error, CliResult, SUCCESS};
use crate::output::{print_command_ok, OutputFormat};

pub fn run(args: ConsumptionArgs, format: OutputFormat) -> CliResult<i32> {
    let config = if args.disable {
        None
    } else {
        args.measures.consumption_config()?
    };

    let protocol = Protocol::new(args.device.open()?);
    protocol
        .configure_consumption(config.as_ref())
        .map_err(command_error)?;

    let command = if config.is_some() {
        "consumption"
    } else {
        "consumption-disable"
    };
    print_command_ok(command, &args.device.device(), format);
    Ok(SUCCESS)
}
