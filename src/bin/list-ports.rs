use std::error::Error;

use flux_logger::ports::accessible_ports;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let ports = accessible_ports()?;
    if ports.is_empty() {
        eprintln!("no accessible serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }

    Ok(())
}
