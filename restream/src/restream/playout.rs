//! Playout port assignment for inputs.

use std::collections::HashMap;

use tracing::debug;

use crate::Result;
use crate::domain::ProcessConfig;
use crate::transcoder::{PortError, Transcoder};

/// Option that carries the playout HTTP port.
pub(crate) const PLAYOUT_PORT_OPTION: &str = "-playout_httpport";

const PLAYOUT_SCHEMES: [&str; 2] = ["avstream:", "playout:"];

pub(crate) fn is_playout_address(address: &str) -> bool {
    PLAYOUT_SCHEMES
        .iter()
        .any(|scheme| address.starts_with(scheme))
}

/// Remove every port option together with its value.
fn strip_port_option(options: &[String]) -> Vec<String> {
    let mut stripped = Vec::with_capacity(options.len() + 2);
    let mut iter = options.iter();

    while let Some(option) = iter.next() {
        if option == PLAYOUT_PORT_OPTION {
            iter.next();
            continue;
        }
        stripped.push(option.clone());
    }

    stripped
}

/// Give every playout input a port from the shared pool.
///
/// User supplied port options are replaced. Without a configured port range
/// the inputs run without a playout port. On any other allocation failure
/// the ports taken so far are returned.
pub(crate) fn assign_ports(
    config: &mut ProcessConfig,
    transcoder: &dyn Transcoder,
) -> Result<HashMap<String, u16>> {
    let mut ports = HashMap::new();

    for input in &mut config.input {
        if !is_playout_address(&input.address) {
            continue;
        }

        let mut options = strip_port_option(&input.options);

        match transcoder.get_port() {
            Ok(port) => {
                options.push(PLAYOUT_PORT_OPTION.to_string());
                options.push(port.to_string());
                debug!(process_id = %config.id, input_id = %input.id, port, "Assigned playout port");
                ports.insert(input.id.clone(), port);
            }
            Err(PortError::NoPortRange) => {
                debug!(process_id = %config.id, input_id = %input.id, "No playout port range configured");
            }
            Err(e) => {
                release_ports(transcoder, &mut ports);
                return Err(e.into());
            }
        }

        input.options = options;
    }

    Ok(ports)
}

/// Return all ports to the pool and clear the map.
pub(crate) fn release_ports(transcoder: &dyn Transcoder, ports: &mut HashMap<String, u16>) {
    for (_, port) in ports.drain() {
        transcoder.put_port(port);
    }
}
