//! Transcoder command line assembly.

use crate::domain::ProcessConfig;

/// Flag that precedes every input address.
const INPUT_FLAG: &str = "-i";

fn push_inputs(config: &ProcessConfig, command: &mut Vec<String>) {
    for input in &config.input {
        command.extend(input.options.iter().cloned());
        command.push(INPUT_FLAG.to_string());
        command.push(input.address.clone());
    }
}

/// Build the argument list of a resolved config.
///
/// Global options come first, then each input's options followed by `-i`
/// and its address, then each output's options followed by its address.
pub(crate) fn build_command(config: &ProcessConfig) -> Vec<String> {
    let mut command = config.options.clone();
    push_inputs(config, &mut command);

    for output in &config.output {
        command.extend(output.options.iter().cloned());
        command.push(output.address.clone());
    }

    command
}

/// Build the argument list of a probe run: global options and inputs only.
pub(crate) fn build_probe_command(config: &ProcessConfig) -> Vec<String> {
    let mut command = config.options.clone();
    push_inputs(config, &mut command);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigIo;

    fn config() -> ProcessConfig {
        ProcessConfig::new("p")
            .with_options(["g"])
            .with_input(ConfigIo::new("in", "i1").with_options(["a"]))
            .with_output(ConfigIo::new("out", "o1").with_options(["b"]))
    }

    #[test]
    fn test_command_order() {
        assert_eq!(build_command(&config()), vec!["g", "a", "-i", "i1", "b", "o1"]);
    }

    #[test]
    fn test_probe_command() {
        assert_eq!(build_probe_command(&config()), vec!["g", "a", "-i", "i1"]);
    }
}
