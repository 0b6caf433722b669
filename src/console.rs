//! Line-oriented WiFi console.
//!
//! Used by the firmware over USB serial and by the `wifi-sim` host binary.
//!
//! # Commands
//!
//! - `connect <ssid> [password]` - Join a network
//! - `disconnect` - Leave the current network
//! - `scan` - List nearby access points
//! - `status` - Radio mode, power save and station status
//! - `details` - Configured network
//! - `ip` - Station addresses and MAC
//! - `help` - Show available commands
//!
//! # Example Session
//!
//! ```text
//! > scan
//! Scan started
//! Found 2 networks:
//!   home                             -52 dBm  ch 6   wpa2
//!   cafe                             -71 dBm  ch 11  open
//!
//! > connect home hunter22
//! Connecting to home...
//! [associated] {"event":"associated","ssid":"home","mac":"02:00:5e:00:00:01","channel":6}
//! [connected] {"event":"connected","ip":"192.168.1.100","netmask":"255.255.255.0","gw":"192.168.1.1"}
//! connect: ok
//! ```

use crate::wifi::{
    CompletionHandle, ConnectOptions, EventSink, Notification, OperationKind, Outcome,
    RadioDriver, ScanBatch, WifiStation,
};
use log::{debug, warn};
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Join a network; no password means an open network.
    Connect {
        ssid: String,
        password: Option<String>,
    },
    Disconnect,
    Scan,
    Status,
    Details,
    Ip,
    Help,
    Quit,
    /// Unknown or invalid command, with a message for the user.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse a command from an input line.
    ///
    /// SSIDs containing spaces are not supported; everything after the SSID
    /// is taken as the password.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ConsoleCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match cmd.to_lowercase().as_str() {
            "connect" | "c" => {
                let mut connect_parts = args.splitn(2, ' ');
                let ssid = connect_parts.next().unwrap_or("").to_string();
                let password = connect_parts
                    .next()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
                if ssid.is_empty() {
                    ConsoleCommand::Unknown("Usage: connect <ssid> [password]".to_string())
                } else {
                    ConsoleCommand::Connect { ssid, password }
                }
            }
            "disconnect" | "dc" | "d" => ConsoleCommand::Disconnect,
            "scan" | "sc" => ConsoleCommand::Scan,
            "status" | "stat" | "s" => ConsoleCommand::Status,
            "details" | "info" => ConsoleCommand::Details,
            "ip" => ConsoleCommand::Ip,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  connect <ssid> [password]   Join a network (no password = open network)
  disconnect                  Leave the current network
  scan                        List nearby access points
  status                      Radio mode, power save and station status
  details                     Configured network
  ip                          Station addresses and MAC
  help                        Show this help
  quit                        Exit the console

Shortcuts: c=connect, d=disconnect, sc=scan, s=status, h=help, q=quit
"#;

/// Format a scan result as a table.
pub fn format_networks(batch: &ScanBatch) -> String {
    if batch.is_empty() {
        return "No networks found.".to_string();
    }

    let mut output = format!("Found {} networks:\n", batch.len());
    for ap in batch.records() {
        output.push_str(&format!(
            "  {:<32} {:>4} dBm  ch {:<3} {}\n",
            ap.ssid, ap.rssi, ap.channel, ap.auth_mode
        ));
    }
    output
}

/// Format the outcome of an asynchronous operation.
pub fn format_outcome(kind: OperationKind, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success => format!("{}: ok", kind),
        Outcome::Networks(batch) => format_networks(batch),
        Outcome::Failed { reason } => format!("{} failed: {}", kind, reason),
    }
}

/// Format a notification for display.
pub fn format_notification(notification: &Notification) -> String {
    format!("[{}] {}", notification.topic(), notification.to_json())
}

/// Print a line to stdout.
pub fn print_line(msg: &str) {
    println!("{}", msg);
    let _ = std::io::stdout().flush();
}

/// Print the prompt.
pub fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_on_complete(kind: OperationKind) -> CompletionHandle {
    CompletionHandle::new(move |outcome| print_line(&format_outcome(kind, &outcome)))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}

/// Run one command against `station`, returning the immediate output.
///
/// Results of asynchronous operations are printed later, when the
/// dispatcher runs their completion.
pub fn execute<D, S>(station: &WifiStation<D, S>, command: ConsoleCommand) -> String
where
    D: RadioDriver,
    S: EventSink,
{
    match command {
        ConsoleCommand::Connect { ssid, password } => {
            let options = ConnectOptions { password };
            match station.connect(&ssid, &options, print_on_complete(OperationKind::Connect)) {
                Ok(()) => format!("Connecting to {}...", ssid),
                Err(e) => format!("Error: {}", e),
            }
        }
        ConsoleCommand::Disconnect => {
            match station.disconnect(print_on_complete(OperationKind::Disconnect)) {
                Ok(()) => "Disconnecting...".to_string(),
                Err(e) => format!("Error: {}", e),
            }
        }
        ConsoleCommand::Scan => match station.scan(print_on_complete(OperationKind::Scan)) {
            Ok(()) => "Scan started".to_string(),
            Err(e) => format!("Error: {}", e),
        },
        ConsoleCommand::Status => match station.status() {
            Ok(status) => to_json(&status),
            Err(e) => format!("Error: {}", e),
        },
        ConsoleCommand::Details => match station.details() {
            Ok(details) => to_json(&details),
            Err(e) => format!("Error: {}", e),
        },
        ConsoleCommand::Ip => match station.ip() {
            Ok(ip) => to_json(&ip),
            Err(e) => format!("Error: {}", e),
        },
        ConsoleCommand::Help => HELP_TEXT.to_string(),
        ConsoleCommand::Quit => "Bye".to_string(),
        ConsoleCommand::Unknown(msg) => msg,
    }
}

/// Read commands from stdin until `quit`, end of input, or `cancel`.
///
/// Cancels `cancel` on exit so sibling tasks stop too.
pub async fn serve_stdin<D, S>(station: Arc<WifiStation<D, S>>, cancel: CancellationToken)
where
    D: RadioDriver + 'static,
    S: EventSink + 'static,
{
    serve_lines(station, BufReader::new(std::io::stdin()), cancel).await;
}

/// Read commands from `input` until `quit`, end of input, or `cancel`.
///
/// Returns as soon as `cancel` fires, even while a read is blocked; the
/// blocked reader thread is left behind and exits with its next line.
/// Cancels `cancel` on exit.
pub async fn serve_lines<D, S, R>(
    station: Arc<WifiStation<D, S>>,
    input: R,
    cancel: CancellationToken,
) where
    D: RadioDriver + 'static,
    S: EventSink + 'static,
    R: BufRead + Send + 'static,
{
    print_line("Type 'help' for commands");
    print_prompt();

    let reader_cancel = cancel.clone();
    let mut reader_task = tokio::task::spawn_blocking(move || {
        let mut lines = input.lines();

        while !reader_cancel.is_cancelled() {
            match lines.next() {
                Some(Ok(line)) => {
                    let command = ConsoleCommand::parse(&line);
                    if command == ConsoleCommand::Quit {
                        break;
                    }
                    let output = execute(&*station, command);
                    if !output.is_empty() {
                        print_line(&output);
                    }
                    print_prompt();
                }
                Some(Err(e)) => {
                    warn!("Failed to read console input: {}", e);
                    break;
                }
                None => break,
            }
        }
    });

    tokio::select! {
        result = &mut reader_task => {
            if let Err(e) = result {
                warn!("Console task failed: {}", e);
            }
        }
        _ = cancel.cancelled() => {
            debug!("Console cancelled while waiting for input");
        }
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::delivery::channel;
    use crate::wifi::sim::{DriverCall, SimulatedAp, SimulatedRadio};
    use crate::wifi::{AccessPointRecord, AuthMode, MacAddr, ManagerConfig};
    use std::io::Read;

    // ==================== Parse Tests ====================

    #[test]
    fn test_parse_connect_with_password() {
        assert_eq!(
            ConsoleCommand::parse("connect home hunter 22"),
            ConsoleCommand::Connect {
                ssid: "home".to_string(),
                password: Some("hunter 22".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_connect_open() {
        assert_eq!(
            ConsoleCommand::parse("c cafe"),
            ConsoleCommand::Connect {
                ssid: "cafe".to_string(),
                password: None,
            }
        );
    }

    #[test]
    fn test_parse_connect_missing_ssid() {
        assert!(matches!(
            ConsoleCommand::parse("connect"),
            ConsoleCommand::Unknown(_)
        ));
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ConsoleCommand::parse("disconnect"), ConsoleCommand::Disconnect);
        assert_eq!(ConsoleCommand::parse("d"), ConsoleCommand::Disconnect);
        assert_eq!(ConsoleCommand::parse("SCAN"), ConsoleCommand::Scan);
        assert_eq!(ConsoleCommand::parse("s"), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("details"), ConsoleCommand::Details);
        assert_eq!(ConsoleCommand::parse("ip"), ConsoleCommand::Ip);
        assert_eq!(ConsoleCommand::parse("?"), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("exit"), ConsoleCommand::Quit);
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            ConsoleCommand::parse("reboot"),
            ConsoleCommand::Unknown(_)
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(
            ConsoleCommand::parse("   "),
            ConsoleCommand::Unknown(String::new())
        );
    }

    // ==================== Format Tests ====================

    #[test]
    fn test_format_networks() {
        assert_eq!(format_networks(&ScanBatch::default()), "No networks found.");

        let batch: ScanBatch = vec![AccessPointRecord {
            ssid: "home".to_string(),
            mac: MacAddr::default(),
            channel: 6,
            rssi: -52,
            auth_mode: AuthMode::Wpa2,
        }]
        .into_iter()
        .collect();
        let output = format_networks(&batch);
        assert!(output.starts_with("Found 1 networks:"));
        assert!(output.contains("home"));
        assert!(output.contains("-52 dBm"));
        assert!(output.contains("wpa2"));
    }

    #[test]
    fn test_format_outcome() {
        assert_eq!(
            format_outcome(OperationKind::Connect, &Outcome::Success),
            "connect: ok"
        );
        assert_eq!(
            format_outcome(OperationKind::Connect, &Outcome::failed("Bad password")),
            "connect failed: Bad password"
        );
    }

    #[test]
    fn test_format_notification() {
        assert_eq!(
            format_notification(&Notification::DhcpTimeout),
            r#"[dhcp_timeout] {"event":"dhcp_timeout"}"#
        );
    }

    // ==================== Execute Tests ====================

    #[test]
    fn test_execute_against_simulator() {
        let (sink, _dispatcher) = channel();
        let radio = SimulatedRadio::new(vec![SimulatedAp::open("cafe", -60)]);
        let station = WifiStation::new(radio, sink, ManagerConfig::default()).unwrap();

        assert_eq!(
            execute(&station, ConsoleCommand::parse("connect cafe")),
            "Connecting to cafe..."
        );
        assert!(execute(&station, ConsoleCommand::Scan).starts_with("Scan started"));
        assert_eq!(
            execute(&station, ConsoleCommand::Scan),
            "Error: A scan is already in progress."
        );
        assert!(execute(&station, ConsoleCommand::Status).contains("\"mode\": \"sta\""));
        assert!(execute(&station, ConsoleCommand::Details).contains("\"ssid\": \"cafe\""));
        assert!(execute(&station, ConsoleCommand::Help).contains("Available commands"));
    }

    #[test]
    fn test_execute_reports_config_errors() {
        let (sink, _dispatcher) = channel();
        let station =
            WifiStation::new(SimulatedRadio::new(Vec::new()), sink, ManagerConfig::default())
                .unwrap();
        let long = "x".repeat(33);
        let output = execute(
            &station,
            ConsoleCommand::Connect {
                ssid: long,
                password: None,
            },
        );
        assert!(output.starts_with("Error: invalid configuration: SSID too long"));
    }

    // ==================== Serve Tests ====================

    /// Console input fed line by line from the test; blocks while empty.
    struct QueuedInput {
        lines: std::sync::mpsc::Receiver<String>,
        current: std::io::Cursor<Vec<u8>>,
    }

    impl QueuedInput {
        fn new() -> (std::sync::mpsc::Sender<String>, Self) {
            let (tx, lines) = std::sync::mpsc::channel();
            let input = Self {
                lines,
                current: std::io::Cursor::new(Vec::new()),
            };
            (tx, input)
        }
    }

    impl Read for QueuedInput {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.current.position() as usize >= self.current.get_ref().len() {
                match self.lines.recv() {
                    Ok(line) => self.current = std::io::Cursor::new(line.into_bytes()),
                    Err(_) => return Ok(0),
                }
            }
            self.current.read(buf)
        }
    }

    fn sim_station() -> Arc<WifiStation<SimulatedRadio, crate::wifi::ChannelSink>> {
        let (sink, _dispatcher) = channel();
        let radio = SimulatedRadio::new(vec![SimulatedAp::open("cafe", -60)]);
        Arc::new(WifiStation::new(radio, sink, ManagerConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_serve_returns_on_cancel_while_input_blocked() {
        let (tx, input) = QueuedInput::new();
        let cancel = CancellationToken::new();
        let serve = tokio::spawn(serve_lines(
            sim_station(),
            BufReader::new(input),
            cancel.clone(),
        ));

        // Let the reader block on the empty input.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        let finished = tokio::time::timeout(std::time::Duration::from_secs(2), serve).await;
        assert!(finished.is_ok(), "console kept waiting for input after cancel");

        // Release the reader thread so the runtime can shut down.
        drop(tx);
    }

    #[tokio::test]
    async fn test_serve_runs_commands_until_quit() {
        let (tx, input) = QueuedInput::new();
        let station = sim_station();
        let cancel = CancellationToken::new();

        tx.send("connect cafe\n".to_string()).unwrap();
        tx.send("quit\n".to_string()).unwrap();
        let serve = serve_lines(Arc::clone(&station), BufReader::new(input), cancel.clone());
        tokio::time::timeout(std::time::Duration::from_secs(2), serve)
            .await
            .unwrap();

        assert!(cancel.is_cancelled());
        assert!(station.with_driver(|radio| radio.calls().contains(&DriverCall::Connect)));
    }
}
