use cnlink_protocol::{Direction, Protocol};

use crate::cmd::PowerArgs;
use crate::exit::{command_error, CliResult, SUCCESS};
use crate::output::{print_command_ok, OutputFormat};

pub fn run(args: PowerArgs, direction: Direction, format: OutputFormat) -> CliResult<i32> {
    let link = args.device.open()?;
    let protocol = Protocol::new(link);

    protocol
        .start_stop(direction, args.source.into())
        .map_err(command_error)?;

    let command = match direction {
        Direction::Start => "start",
        Direction::Stop => "stop",
    };
    print_command_ok(command, &args.device.device(), format);
    Ok(SUCCESS)
}
