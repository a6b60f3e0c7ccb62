//! Placeholder substitution in process configs.
//!
//! Each field is scanned once for `{name}` tokens. Only the names allowed in
//! the scope of that field are replaced; everything else, including
//! malformed tokens, is copied verbatim. Substituted values are never
//! scanned again.
//!
//! A token may carry an escape suffix, `{name^c}`, in which case every `c`
//! and every backslash in the substituted value is prefixed with a
//! backslash.

use crate::domain::ProcessConfig;

/// A parsed `{name}` or `{name^c}` token.
struct Token<'a> {
    name: &'a str,
    escape: Option<char>,
    /// Length of the token in bytes, braces included.
    len: usize,
}

/// Parse a token at the start of `s`, which must begin with `{`.
fn parse_token(s: &str) -> Option<Token<'_>> {
    let body = s.strip_prefix('{')?;
    let name_len = body.bytes().take_while(u8::is_ascii_lowercase).count();
    if name_len == 0 {
        return None;
    }

    let name = &body[..name_len];
    let mut rest = &body[name_len..];
    let mut len = 1 + name_len;
    let mut escape = None;

    if let Some(after) = rest.strip_prefix('^') {
        let c = after.chars().next()?;
        escape = Some(c);
        len += 1 + c.len_utf8();
        rest = &after[c.len_utf8()..];
    }

    rest.starts_with('}').then_some(Token {
        name,
        escape,
        len: len + 1,
    })
}

fn push_value(out: &mut String, value: &str, escape: Option<char>) {
    match escape {
        None => out.push_str(value),
        Some(c) => {
            for ch in value.chars() {
                if ch == c || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
    }
}

/// Replace the tokens named in `vars` in a single pass.
pub(crate) fn replace(input: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        match parse_token(candidate) {
            Some(token) => {
                match vars.iter().find(|(name, _)| *name == token.name) {
                    Some((_, value)) => push_value(&mut out, value, token.escape),
                    None => out.push_str(&candidate[..token.len]),
                }
                rest = &candidate[token.len..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Expand the known placeholders of a config in place.
///
/// Global options are expanded first, then every input (its ID before its
/// address and options) and finally every output likewise.
pub(crate) fn resolve_placeholders(config: &mut ProcessConfig, diskfs: &str, memfs: &str) {
    let process_id = config.id.clone();
    let reference = config.reference.clone();

    let global = [("diskfs", diskfs)];
    for option in &mut config.options {
        *option = replace(option, &global);
    }

    let id_scope = [
        ("processid", process_id.as_str()),
        ("reference", reference.as_str()),
    ];

    for input in &mut config.input {
        input.id = replace(&input.id, &id_scope);

        let scope = [
            ("inputid", input.id.as_str()),
            ("processid", process_id.as_str()),
            ("reference", reference.as_str()),
            ("diskfs", diskfs),
            ("memfs", memfs),
        ];
        input.address = replace(&input.address, &scope);
        for option in &mut input.options {
            *option = replace(option, &scope);
        }
    }

    for output in &mut config.output {
        output.id = replace(&output.id, &id_scope);

        let scope = [
            ("outputid", output.id.as_str()),
            ("processid", process_id.as_str()),
            ("reference", reference.as_str()),
            ("diskfs", diskfs),
            ("memfs", memfs),
        ];
        output.address = replace(&output.address, &scope);
        for option in &mut output.options {
            *option = replace(option, &scope);
        }

        let cleanup_scope = &scope[..3];
        for cleanup in &mut output.cleanup {
            cleanup.pattern = replace(&cleanup.pattern, cleanup_scope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfigIo, ConfigIoCleanup};

    #[test]
    fn test_replace_known_token() {
        assert_eq!(
            replace("{diskfs}/live.m3u8", &[("diskfs", "/data")]),
            "/data/live.m3u8"
        );
    }

    #[test]
    fn test_replace_leaves_unknown_and_malformed() {
        let vars = [("processid", "p1")];
        assert_eq!(replace("{unknown}/{processid}", &vars), "{unknown}/p1");
        assert_eq!(replace("{processid", &vars), "{processid");
        assert_eq!(replace("{Processid}", &vars), "{Processid}");
        assert_eq!(replace("{}{{processid}}", &vars), "{}{p1}");
    }

    #[test]
    fn test_replace_is_single_pass() {
        let vars = [("processid", "{reference}"), ("reference", "r")];
        assert_eq!(replace("{processid}", &vars), "{reference}");
    }

    #[test]
    fn test_replace_with_escape() {
        let vars = [("memfs", "http://127.0.0.1:8080/memfs")];
        assert_eq!(
            replace("{memfs^:}/x", &vars),
            r"http\://127.0.0.1\:8080/memfs/x"
        );
        assert_eq!(replace(r"{processid^,}", &[("processid", r"a,b\c")]), r"a\,b\\c");
    }

    #[test]
    fn test_resolve_scopes() {
        let mut config = ProcessConfig::new("p1")
            .with_reference("ref")
            .with_options(["-loglevel", "{diskfs}", "{memfs}"])
            .with_input(
                ConfigIo::new("in_{processid}", "{memfs}/{inputid}.ts")
                    .with_options(["-name", "{inputid}", "{outputid}"]),
            )
            .with_output(
                ConfigIo::new("out_{reference}", "{diskfs}/{processid}/{outputid}.m3u8")
                    .with_options(["{inputid}", "{outputid}"])
                    .with_cleanup(ConfigIoCleanup::new("diskfs:/{processid}/{outputid}_*.ts {diskfs}")),
            );

        resolve_placeholders(&mut config, "/mnt/disk", "http://mem");

        // {memfs} is not valid in global options.
        assert_eq!(config.options, vec!["-loglevel", "/mnt/disk", "{memfs}"]);

        let input = &config.input[0];
        assert_eq!(input.id, "in_p1");
        assert_eq!(input.address, "http://mem/in_p1.ts");
        assert_eq!(input.options, vec!["-name", "in_p1", "{outputid}"]);

        let output = &config.output[0];
        assert_eq!(output.id, "out_ref");
        assert_eq!(output.address, "/mnt/disk/p1/out_ref.m3u8");
        assert_eq!(output.options, vec!["{inputid}", "out_ref"]);
        assert_eq!(
            output.cleanup[0].pattern,
            "diskfs:/p1/out_ref_*.ts {diskfs}"
        );
    }
}
