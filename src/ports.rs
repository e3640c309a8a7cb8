#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("port enumeration failed: {0}")]
    Enumeration(serialport::Error),
}

/// Fails on platforms whose serial device namespace is not known.
pub fn ensure_supported(os: &str) -> Result<(), Error> {
    match os {
        "windows" | "linux" | "macos" => Ok(()),
        other => Err(Error::UnsupportedPlatform(other.to_string())),
    }
}

/// Serial ports the system reports on `os` (as in [`std::env::consts::OS`]).
pub fn candidate_ports(os: &str) -> Result<Vec<String>, Error> {
    ensure_supported(os)?;
    let ports = serialport::available_ports().map_err(Error::Enumeration)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Candidate ports on `os` that can currently be opened.
///
/// Enumeration failures only produce a warning and an empty list; an
/// unsupported platform is an error.
pub fn accessible_ports_on(os: &str) -> Result<Vec<String>, Error> {
    let candidates = match candidate_ports(os) {
        Ok(candidates) => candidates,
        Err(Error::Enumeration(e)) => {
            log::warn!("serial port enumeration failed: {e}");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let ports = candidates
        .into_iter()
        .filter(|port| match serialport::new(port, 9600).open() {
            Ok(_) => true,
            Err(e) => {
                log::trace!("skipping {port}: {e}");
                false
            }
        })
        .collect();
    Ok(ports)
}

pub fn accessible_ports() -> Result<Vec<String>, Error> {
    accessible_ports_on(std::env::consts::OS)
}
