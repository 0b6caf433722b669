//! Host simulator for the WiFi station manager.
//!
//! Runs the station manager against a simulated radio and exposes the same
//! console as the firmware. The simulated radio's events are fed through the
//! classifier from a separate task, as the ESP-IDF event loop would.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin wifi-sim -- \
//!     --network home:-52:wpa2:hunter22 \
//!     --network cafe:-71:open
//! ```

use clap::Parser;
use esp32_wifi_station::console::{self, format_notification, print_line};
use esp32_wifi_station::wifi::sim::{SimulatedAp, SimulatedRadio};
use esp32_wifi_station::wifi::{delivery, ManagerConfig, Notification, ScanOptions, WifiStation};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often the simulated radio's pending events are delivered.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Simulated ESP32 WiFi station.
#[derive(Parser, Debug)]
#[command(name = "wifi-sim", version, about)]
struct Args {
    /// Access point visible to the radio, as SSID:RSSI:AUTH[:PASSWORD]
    /// (AUTH is open, wep, wpa, wpa2 or wpa_wpa2). Repeatable.
    #[arg(short, long = "network", value_name = "AP")]
    networks: Vec<SimulatedAp>,

    /// Resolve a pending connect with "Bad password" when the password is
    /// rejected.
    #[arg(long)]
    report_auth_failure: bool,

    /// Restrict scans to one channel (0 = all channels).
    #[arg(long, default_value_t = 0)]
    scan_channel: u8,

    /// Leave hidden networks out of scan results.
    #[arg(long)]
    no_hidden: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(args));

    // The stdin reader may still be blocked on a line that never comes.
    runtime.shutdown_background();
    info!("Shutdown complete");
}

async fn run(args: Args) {
    info!("=== WiFi station simulator starting ===");
    for ap in &args.networks {
        info!("Simulated AP: {} ({} dBm, {})", ap.ssid, ap.rssi, ap.auth_mode);
    }

    let config = ManagerConfig {
        scan: ScanOptions {
            show_hidden: !args.no_hidden,
            channel: args.scan_channel,
        },
        report_auth_failure: args.report_auth_failure,
    };

    let (sink, mut dispatcher) = delivery::channel();
    dispatcher.on_any(|n: &Notification| print_line(&format_notification(n)));

    let station = match WifiStation::new(SimulatedRadio::new(args.networks), sink, config) {
        Ok(station) => Arc::new(station),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();

    let dispatch_cancel = cancel.clone();
    let dispatch_task = tokio::spawn(async move {
        dispatcher.run(dispatch_cancel).await;
    });

    let radio_station = station.clone();
    let radio_cancel = cancel.clone();
    let radio_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = radio_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for event in radio_station.with_driver(|radio| radio.take_events()) {
                        radio_station.handle_event(&event);
                    }
                }
            }
        }
    });

    print_line("=== WiFi Station Simulator ===");
    let console_task = tokio::spawn(console::serve_stdin(station, cancel.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            print_line("\nShutting down...");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }

    for (name, task) in [
        ("console", console_task),
        ("dispatcher", dispatch_task),
        ("radio", radio_task),
    ] {
        if let Err(e) = task.await {
            error!("{} task error: {}", name, e);
        }
    }
}
