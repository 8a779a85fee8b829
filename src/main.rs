//! Exercise Bike Cycle Counter
//!
//! Counts pulses from a single GPIO sensor and writes one line-protocol
//! record to stdout per write interval. Logs go to stderr.
//!
//! Usage: cycle-counter [--config <path>] [--simulate <rpm>]

use cycle_counter::observability;
use cycle_counter::sensor::{CounterHandle, PinConfig, PulseInput, SimulatedInput, SysfsInput};
use cycle_counter::{Config, CycleMonitor, Error, StdoutSink, SystemClock};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

struct Args {
    config: Option<PathBuf>,
    simulate: Option<f64>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        simulate: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--simulate" => {
                let rpm = iter.next().ok_or("--simulate needs a cadence in rpm")?;
                let rpm = rpm
                    .parse::<f64>()
                    .map_err(|e| format!("invalid --simulate value {:?}: {}", rpm, e))?;
                args.simulate = Some(rpm);
            }
            other => return Err(format!("unknown argument {:?}", other)),
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = observability::init_tracing() {
        eprintln!("failed to initialize logging: {}", e);
    }

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", Error::from(e));
            return ExitCode::from(1);
        }
    };

    info!(
        gpio_pin = config.gpio_pin,
        cycles_per_calorie = config.cycles_per_calorie,
        poll_interval_secs = config.poll_interval_secs,
        debounce_ms = config.debounce_ms,
        write_interval_secs = config.write_interval_secs,
        write_on_no_change = config.write_on_no_change,
        calculate_distance = config.calculate_distance,
        wheel_radius_cm = config.wheel_radius_cm,
        speed_format = %config.speed_format,
        measurement = %config.measurement,
        "Starting cycle counter"
    );

    let result = match args.simulate {
        Some(rpm) => {
            info!(rpm, "Using simulated sensor");
            run(SimulatedInput::new().with_cadence(rpm), config).await
        }
        None => run(SysfsInput::new(), config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to acquire sensor: {}", e);
            ExitCode::from(1)
        }
    }
}

async fn run<P: PulseInput>(input: P, config: Config) -> Result<(), Error> {
    let pin = PinConfig::rising(config.gpio_pin, config.debounce());
    let handle = CounterHandle::init(input, &pin)?;

    let monitor = CycleMonitor::new(handle, SystemClock, StdoutSink, config);
    let handle = monitor.run_until(shutdown_signal()).await;
    handle.teardown();

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
