//! Input/output address resolution and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use normalize_path::NormalizePath;
use regex::Regex;

use crate::domain::{ConfigIo, ProcessConfig};
use crate::transcoder::Transcoder;
use crate::utils::url;
use crate::{Error, Result};

/// Address of the transcoder's standard output.
pub(crate) const PIPE_ADDRESS: &str = "pipe:";

const FILE_PREFIX: &str = "file:";
const TEE_PREFIX: &str = "tee:";

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(.+):output=(.+)").expect("reference pattern is valid")
});

/// Resolve `#<process>:output=<output>` input addresses.
///
/// `lookup` returns the resolved config of another process. Addresses that
/// don't start with `#` are left untouched.
pub(crate) fn resolve_references<'a, F>(config: &mut ProcessConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<&'a ProcessConfig>,
{
    let process_id = config.id.clone();

    for input in &mut config.input {
        input.address = resolve_reference(&process_id, &input.address, &lookup)
            .map_err(|reason| Error::reference(&process_id, &input.id, reason))?;
    }

    Ok(())
}

fn resolve_reference<'a, F>(
    process_id: &str,
    address: &str,
    lookup: &F,
) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<&'a ProcessConfig>,
{
    if address.is_empty() {
        return Err("empty address".to_string());
    }

    if !address.starts_with('#') {
        return Ok(address.to_string());
    }

    let caps = REFERENCE_RE
        .captures(address)
        .ok_or_else(|| format!("invalid format ({address})"))?;
    let target = &caps[1];
    let output_id = &caps[2];

    if target == process_id {
        return Err(format!("self-reference not possible ({address})"));
    }

    let other = lookup(target).ok_or_else(|| format!("unknown process '{target}' ({address})"))?;

    other
        .output
        .iter()
        .find(|output| output.id == output_id)
        .map(|output| output.address.clone())
        .ok_or_else(|| format!("the process '{target}' has no outputs with the ID '{output_id}' ({address})"))
}

/// Validate the endpoints of a config and rewrite addresses to their
/// canonical form.
///
/// Returns whether any output writes into the disk filesystem.
pub(crate) fn validate_config(
    config: &mut ProcessConfig,
    disk_base: &str,
    transcoder: &dyn Transcoder,
) -> Result<bool> {
    if config.input.is_empty() {
        return Err(Error::config("at least one input must be defined"));
    }

    normalize_ids(&mut config.input, "input")?;

    for input in &mut config.input {
        input.address = input.address.trim().to_string();
        if input.address.is_empty() {
            return Err(Error::config(format!(
                "the address for input '#{}:{}' must not be empty",
                config.id, input.id
            )));
        }

        validate_input_address(&input.address, transcoder).map_err(|reason| {
            Error::config(format!(
                "the address for input '#{}:{}' ({}) is invalid: {}",
                config.id, input.id, input.address, reason
            ))
        })?;
    }

    if config.output.is_empty() {
        return Err(Error::config("at least one output must be defined"));
    }

    normalize_ids(&mut config.output, "output")?;

    let base = disk_base_path(disk_base);
    let mut uses_disk = false;

    for output in &mut config.output {
        output.address = output.address.trim().to_string();
        if output.address.is_empty() {
            return Err(Error::config(format!(
                "the address for output '#{}:{}' must not be empty",
                config.id, output.id
            )));
        }

        let (address, is_file) = validate_output_address(&output.address, base.as_deref())
            .and_then(|(address, is_file)| {
                if transcoder.validate_output_address(&address) {
                    Ok((address, is_file))
                } else {
                    Err("address is not allowed".to_string())
                }
            })
            .map_err(|reason| {
                Error::config(format!(
                    "the address for output '#{}:{}' ({}) is invalid: {}",
                    config.id, output.id, output.address, reason
                ))
            })?;

        output.address = address;
        uses_disk |= is_file;
    }

    Ok(uses_disk)
}

fn normalize_ids(endpoints: &mut [ConfigIo], kind: &str) -> Result<()> {
    let mut seen = HashSet::new();

    for io in endpoints {
        io.id = io.id.trim().to_string();

        if io.id.is_empty() {
            return Err(Error::config(format!("empty {kind} IDs are not allowed")));
        }
        if !seen.insert(io.id.clone()) {
            return Err(Error::config(format!(
                "the {kind} ID '{}' is already in use",
                io.id
            )));
        }
    }

    Ok(())
}

fn validate_input_address(address: &str, transcoder: &dyn Transcoder) -> std::result::Result<(), String> {
    if url::has_scheme(address) {
        url::validate(address)?;
    }

    if !transcoder.validate_input_address(address) {
        return Err("address is not allowed".to_string());
    }

    Ok(())
}

fn disk_base_path(base: &str) -> Option<PathBuf> {
    if base.trim().is_empty() {
        return None;
    }
    std::path::absolute(base).ok().map(|path| path.normalize())
}

/// Validate a single output address.
///
/// Returns the canonical address and whether it is a file inside the disk
/// filesystem.
pub(crate) fn validate_output_address(
    address: &str,
    disk_base: Option<&Path>,
) -> std::result::Result<(String, bool), String> {
    if let Some(targets) = address.strip_prefix(TEE_PREFIX) {
        let mut is_file = false;
        for target in targets.split('|') {
            let (_, file) = validate_output_address(target, disk_base)?;
            is_file |= file;
        }
        return Ok((address.to_string(), is_file));
    }

    let address = address.strip_prefix(FILE_PREFIX).unwrap_or(address);

    if url::has_scheme(address) {
        url::validate(address)?;
        return Ok((address.to_string(), false));
    }

    if address == "-" {
        return Ok((PIPE_ADDRESS.to_string(), false));
    }

    let path = std::path::absolute(address)
        .map_err(|e| format!("{address} is not a valid path: {e}"))?
        .normalize();

    if path.starts_with("/dev") {
        return Ok((format!("{FILE_PREFIX}{}", path.display()), false));
    }

    let Some(base) = disk_base else {
        return Err(format!("{} is not inside of a filesystem", path.display()));
    };

    if !path.starts_with(base) {
        return Err(format!(
            "{} is not inside of {}",
            path.display(),
            base.display()
        ));
    }

    Ok((format!("{FILE_PREFIX}{}", path.display()), true))
}
