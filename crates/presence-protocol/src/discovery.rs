//! Serial port auto-discovery

use crate::PresenceError;
use tokio_serial::SerialPortType;
use tracing::{debug, info};

/// Descriptive-name fragments of common microcontroller USB bridges
const DEVICE_HINTS: &[&str] = &[
    "arduino",
    "ch340",
    "ch341",
    "wch",
    "cp210",
    "silicon labs",
    "ftdi",
    "usb serial",
    "usb-serial",
    "esp32",
];

/// Port-name fragments used when no descriptive name matches
const NAME_HINTS: &[&str] = &["ttyacm", "ttyusb", "usbmodem", "usbserial"];

/// A serial port with a human-readable description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub name: String,
    pub description: String,
}

/// Enumerate serial ports on this machine
pub fn list_candidates() -> Result<Vec<PortCandidate>, PresenceError> {
    let ports = tokio_serial::available_ports()?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                SerialPortType::UsbPort(usb) => [usb.manufacturer, usb.product]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" "),
                SerialPortType::BluetoothPort => "bluetooth".to_string(),
                SerialPortType::PciPort => "pci".to_string(),
                SerialPortType::Unknown => String::new(),
            };
            PortCandidate {
                name: port.port_name,
                description,
            }
        })
        .collect())
}

/// Pick the port most likely to be the presence microcontroller.
///
/// A description match wins over a name match; ties go to the first listed.
pub fn select_port(candidates: &[PortCandidate]) -> Option<String> {
    let matches = |text: &str, hints: &[&str]| {
        let text = text.to_lowercase();
        hints.iter().any(|hint| text.contains(hint))
    };

    candidates
        .iter()
        .find(|c| matches(&c.description, DEVICE_HINTS))
        .or_else(|| candidates.iter().find(|c| matches(&c.name, NAME_HINTS)))
        .map(|c| c.name.clone())
}

/// Discover the presence sensor port
pub fn discover_port() -> Result<String, PresenceError> {
    let candidates = list_candidates()?;
    debug!("Serial ports: {:?}", candidates);

    let port = select_port(&candidates).ok_or(PresenceError::NoPortFound)?;
    info!("Discovered presence sensor on {}", port);
    Ok(port)
}
