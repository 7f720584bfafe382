use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cnlink_protocol::{MeasuresReader, Protocol};
use crossbeam::channel::{unbounded, RecvTimeoutError};
use tracing::{info, warn};

use crate::cmd::{parse_duration, radio_config, MonitorArgs};
use crate::exit::{command_error, measures_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, OutputFormat};

const UI_POLL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let consumption = args.measures.consumption_config()?;
    let radio = radio_config(args.radio_period)?;
    let deadline = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|d| Instant::now() + d);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let link = Arc::new(args.device.open()?);
    let protocol = Arc::new(Protocol::new(Arc::clone(&link)));

    let (tx, rx) = unbounded();
    let mut reader = MeasuresReader::new(link.measurements(), Arc::clone(&protocol));
    reader
        .start(move |record| {
            let _ = tx.send(record);
        })
        .map_err(measures_error)?;

    protocol.reset_time().map_err(command_error)?;
    protocol
        .configure_consumption(consumption.as_ref())
        .map_err(command_error)?;
    if radio.is_some() {
        protocol
            .configure_radio(radio.as_ref())
            .map_err(command_error)?;
    }
    info!(device = %args.device.device(), "monitoring measures");

    let mut printed = 0usize;
    let mut samples = 0usize;
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match rx.recv_timeout(UI_POLL) {
            Ok(record) => {
                print_record(&record, format);
                printed = printed.saturating_add(1);
                samples = samples.saturating_add(record.sample_count());
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if !link.is_running() {
            warn!("control node link closed");
            break;
        }
    }

    if let Err(err) = protocol.configure_consumption(None) {
        warn!(error = %err, "failed to disable consumption measures");
    }
    if radio.is_some() {
        if let Err(err) = protocol.configure_radio(None) {
            warn!(error = %err, "failed to stop radio measures");
        }
    }
    reader.stop();
    link.stop();
    info!(records = printed, samples, "monitor finished");

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
