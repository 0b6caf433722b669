//! ESP32 WiFi station firmware.
//!
//! Brings up the radio, forwards driver events to the station manager and
//! runs the WiFi console over USB serial.

#[cfg(feature = "esp32")]
#[tokio::main(flavor = "current_thread")]
async fn main() {
    use esp32_wifi_station::console::{self, format_notification, print_line};
    use esp32_wifi_station::wifi::{delivery, EspRadio, EventSubscription, ManagerConfig, WifiStation};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{error, info};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== ESP32 WiFi station starting ===");

    let peripherals = match Peripherals::take() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to take peripherals: {:?}", e);
            return;
        }
    };
    let sysloop = match EspSystemEventLoop::take() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to take system event loop: {:?}", e);
            return;
        }
    };
    let nvs = EspDefaultNvsPartition::take().ok();

    let radio = match EspRadio::new(peripherals.modem, sysloop.clone(), nvs) {
        Ok(radio) => radio,
        Err(e) => {
            error!("WiFi driver init failed: {:?}", e);
            return;
        }
    };

    let (sink, mut dispatcher) = delivery::channel();
    dispatcher.on_any(|n: &delivery::Notification| print_line(&format_notification(n)));

    let station = match WifiStation::new(radio, sink, ManagerConfig::default()) {
        Ok(station) => Arc::new(station),
        Err(e) => {
            error!("Invalid manager config: {}", e);
            return;
        }
    };

    let event_station = station.clone();
    let _subscription =
        match EventSubscription::new(&sysloop, move |raw| event_station.handle_event(&raw)) {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Failed to subscribe to WiFi events: {}", e);
                return;
            }
        };

    let cancel = CancellationToken::new();
    let dispatch_cancel = cancel.clone();
    let dispatch_task = tokio::spawn(async move {
        dispatcher.run(dispatch_cancel).await;
    });

    print_line("=== ESP32 WiFi Console ===");
    console::serve_stdin(station, cancel).await;

    if let Err(e) = dispatch_task.await {
        error!("Dispatcher task error: {}", e);
    }
    info!("Console closed");
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin wifi-sim' to try the station manager on the host.");
}
