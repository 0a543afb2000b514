use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;

use sensorpoll::{export, sequence_gaps, Controller, PollerConfig, SimulatedSensor};

const DEFAULT_DURATION_SECS: f64 = 5.0;
const SAMPLE_RATE: f64 = 1000.0;
const READ_PERIOD: Duration = Duration::from_millis(100);

// a bit more than one read period's worth of samples, so an occasional late
// read does not lose anything
const BUFFER_CAPACITY: usize = 128;

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .context("failed to initialize logger")?;

    let mut args = std::env::args().skip(1);

    let duration_secs = match args.next() {
        Some(arg) => arg
            .parse::<f64>()
            .with_context(|| format!("invalid duration {:?}", arg))?,
        None => DEFAULT_DURATION_SECS,
    };
    anyhow::ensure!(
        duration_secs.is_finite() && duration_secs >= 0.0,
        "duration must be a non-negative number of seconds"
    );

    let maybe_output = args.next().map(PathBuf::from);

    let config = PollerConfig::default().with_capacity(BUFFER_CAPACITY);
    let mut controller = Controller::new(SimulatedSensor::new(SAMPLE_RATE), config);

    controller.start().context("failed to start polling")?;
    log::info!("polling simulated sensor for {} s", duration_secs);

    let deadline = Instant::now() + Duration::from_secs_f64(duration_secs);
    let mut collected = Vec::new();
    let mut last_sequence = None;
    let mut total_gaps = 0;

    while Instant::now() < deadline {
        thread::sleep(READ_PERIOD);

        let samples = controller.read();

        let gaps = sequence_gaps(last_sequence, &samples);
        if gaps > 0 {
            log::warn!("{} samples were overwritten before being read", gaps);
        }
        total_gaps += gaps;

        if let Some(last) = samples.last() {
            last_sequence = Some(last.sequence);
            log::info!(
                "read {} samples, latest force [{:.2}, {:.2}, {:.2}] N",
                samples.len(),
                last.values[0],
                last.values[1],
                last.values[2]
            );
        } else {
            log::info!("read 0 samples");
        }

        collected.extend(samples);
    }

    controller.close();
    collected.extend(controller.read());

    log::info!(
        "collected {} samples ({} lost), {:?}",
        collected.len(),
        total_gaps,
        controller.stats()
    );

    if let Some(output) = maybe_output {
        let is_npy = output
            .extension()
            .map(|extension| extension.eq_ignore_ascii_case("npy"))
            .unwrap_or(false);

        let result = if is_npy {
            log::info!("exporting Numpy file to {:?}", output);
            export::write_npy(&output, &collected)
        } else {
            log::info!("exporting CSV file to {:?}", output);
            export::write_csv(&output, &collected)
        };

        result.with_context(|| format!("failed to export samples to {:?}", output))?;
    }

    Ok(())
}
