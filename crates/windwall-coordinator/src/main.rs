//! Windwall coordinator binary.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use windwall_coordinator::{Cli, CliError, CoordinatorBus, Settings};
use windwall_core::{
    coordinator::Coordinator,
    env::SystemEnv,
    runtime::Runtime,
    telemetry::{TelemetryBuffer, TelemetryReader},
};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(&cli);
    settings.validate()?;
    let duration = settings.duration()?;
    let system = &settings.system;

    let signal = settings.signal.build(system.n_motors)?;
    let coordinator = Coordinator::new(system, signal)?;
    let bus = CoordinatorBus::open(cli.bus)?;
    let telemetry = TelemetryBuffer::new(system.n_motors);
    let reader = telemetry.reader();
    let mut runtime = Runtime::new(coordinator, bus, SystemEnv::default(), telemetry);

    info!(
        bus = ?cli.bus,
        n_motors = system.n_motors,
        rate_hz = system.rate_hz,
        slew_limit_us = system.slew_limit_us,
        preset = ?settings.signal.preset,
        ?duration,
        "starting coordinator"
    );

    // The loop owns a whole thread: it must never wait on the async runtime.
    let stop = Arc::new(AtomicBool::new(false));
    let loop_stop = Arc::clone(&stop);
    let mut control = tokio::task::spawn_blocking(move || runtime.run(&loop_stop));

    let reporter = (cli.telemetry_interval_ms > 0).then(|| {
        tokio::spawn(report_telemetry(reader, Duration::from_millis(cli.telemetry_interval_ms)))
    });

    let finished = tokio::select! {
        joined = &mut control => Some(joined),
        interrupted = tokio::signal::ctrl_c() => {
            match interrupted {
                Ok(()) => info!("interrupt received, stopping"),
                Err(error) => error!(%error, "failed to listen for interrupt, stopping"),
            }
            None
        },
        () = expire(duration) => {
            info!("run duration reached, stopping");
            None
        },
    };

    stop.store(true, Ordering::Release);
    let joined = match finished {
        Some(joined) => joined,
        None => control.await,
    };
    if let Some(reporter) = reporter {
        reporter.abort();
    }

    match joined {
        Ok(Ok(stats)) => {
            info!(
                ticks = stats.ticks,
                skipped = stats.skipped,
                overruns = stats.overruns,
                "coordinator stopped, nodes fail safe within one watchdog window"
            );
            Ok(())
        },
        Ok(Err(failure)) => {
            error!(error = %failure, "coordinator loop failed");
            Err(failure.into())
        },
        Err(failure) => {
            error!(error = %failure, "coordinator loop thread failed");
            Err(failure.into())
        },
    }
}

fn init_tracing(directives: Option<&str>) -> Result<(), CliError> {
    let filter = match directives {
        Some(directives) => {
            EnvFilter::try_new(directives).map_err(|e| CliError::LogFilter(e.to_string()))?
        },
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn expire(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Log the latest published outputs every `every`. Reading never blocks the
/// control loop.
async fn report_telemetry(reader: TelemetryReader, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_tick = None;
    loop {
        interval.tick().await;

        let Some(snapshot) = reader.snapshot() else { continue };
        if last_tick == Some(snapshot.tick) {
            continue;
        }
        last_tick = Some(snapshot.tick);

        let min_us = snapshot.pulses.iter().copied().min().unwrap_or_default();
        let max_us = snapshot.pulses.iter().copied().max().unwrap_or_default();
        info!(tick = snapshot.tick, mean_us = snapshot.mean(), min_us, max_us, "telemetry");
    }
}
