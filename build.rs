fn main() {
    // The ESP-IDF build environment is only needed for Xtensa targets; host
    // builds (tests, simulator) skip it. Build scripts run on the host, so
    // look at TARGET rather than cfg.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
