use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::profile::{FlowControl, InstrumentProfile};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serial port {port} unavailable: {source}")]
    PortUnavailable {
        port: String,
        source: serialport::Error,
    },

    #[error("serial port {port} rejected control line setup: {source}")]
    ControlLines {
        port: String,
        source: serialport::Error,
    },
}

/// Serial settings used to talk to `profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub flow_control: serialport::FlowControl,
    pub data_terminal_ready: bool,
    pub timeout: Duration,
}

impl LinkSettings {
    pub fn for_profile(profile: InstrumentProfile, timeout: Duration) -> Self {
        let traits = profile.traits();
        let full = traits.flow_control == FlowControl::Full;
        LinkSettings {
            baud_rate: traits.baud_rate,
            flow_control: serialport::FlowControl::Hardware,
            data_terminal_ready: full,
            timeout,
        }
    }
}

/// Opens `port` 8N1 with the profile's rate and flow control.
///
/// The driver offers one flow control mode at a time, so profiles asking
/// for XON/XOFF on top of RTS/CTS keep RTS/CTS and get DTR asserted.
pub fn open_link(
    port: &str,
    profile: InstrumentProfile,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, Error> {
    let settings = LinkSettings::for_profile(profile, timeout);
    let mut link = serialport::new(port, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(settings.flow_control)
        .timeout(settings.timeout)
        .open()
        .map_err(|source| Error::PortUnavailable {
            port: port.to_string(),
            source,
        })?;

    if settings.data_terminal_ready {
        link.write_data_terminal_ready(true)
            .map_err(|source| Error::ControlLines {
                port: port.to_string(),
                source,
            })?;
    }

    eprintln!(
        "Serial port {} is open ({} baud, {:?} flow control)",
        port, settings.baud_rate, settings.flow_control
    );
    Ok(link)
}
