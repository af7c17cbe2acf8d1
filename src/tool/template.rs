// src/tool/template.rs

//! Command template macros
//!
//! - `%ID%` is replaced verbatim with the id, any number of times
//! - `%CONFIG%` may appear once; the character before it (ignoring
//!   whitespace) selects the transfer mode:
//!   - `<%CONFIG%`: payload fed on stdin, macro erased
//!   - `>%CONFIG%`: stdout captured as the new payload, macro erased
//!   - `%CONFIG%`: replaced by the path of a temp file holding the payload
//!   - no macro: plain execution, nothing exchanged
//!
//! The resulting line is split on whitespace. There is no quoting, so an
//! argument (or an id) containing spaces ends up split into several.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Id macro
pub const ID_MACRO: &str = "%ID%";
/// Configuration macro
pub const CONFIG_MACRO: &str = "%CONFIG%";

/// How configuration is exchanged with the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Payload written to the tool's stdin
    Stdin,
    /// Tool's stdout read back as the new payload
    Stdout,
    /// Payload round-trips through a temp file passed as an argument
    TempFile,
    /// No exchange
    None,
}

impl TransferMode {
    /// Whether the tool produces a new payload
    pub fn reloads(&self) -> bool {
        matches!(self, Self::Stdout | Self::TempFile)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::TempFile => "tempfile",
            Self::None => "none",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of the temp file path inside argv
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigSlot {
    index: usize,
    prefix: String,
    suffix: String,
}

/// A template resolved into argv and transfer mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<String>,
    mode: TransferMode,
    slot: Option<ConfigSlot>,
}

impl CommandTemplate {
    /// Analyze `template`, substituting `id` for every `%ID%`
    pub fn parse(template: &str, id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Template {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let occurrences = template.matches(CONFIG_MACRO).count();
        if occurrences > 1 {
            return Err(invalid("%CONFIG% may appear at most once"));
        }

        let parsed = match template.find(CONFIG_MACRO) {
            None => Self {
                argv: split_args(&substitute_id(template, id)),
                mode: TransferMode::None,
                slot: None,
            },
            Some(pos) => {
                let before = &template[..pos];
                let after = &template[pos + CONFIG_MACRO.len()..];
                let head = before.trim_end();

                let redirect = match head.chars().last() {
                    Some('<') => Some(TransferMode::Stdin),
                    Some('>') => Some(TransferMode::Stdout),
                    _ => None,
                };

                match redirect {
                    Some(mode) => {
                        let head = &head[..head.len() - 1];
                        if head.trim_end().ends_with(['<', '>']) {
                            return Err(invalid("conflicting redirect modifiers before %CONFIG%"));
                        }
                        let line = format!("{} {}", head, after);
                        Self {
                            argv: split_args(&substitute_id(&line, id)),
                            mode,
                            slot: None,
                        }
                    }
                    None => {
                        let before = substitute_id(before, id);
                        let after = substitute_id(after, id);
                        split_around_slot(&before, &after)
                    }
                }
            }
        };

        if parsed.argv.is_empty() {
            return Err(invalid("command is empty"));
        }
        Ok(parsed)
    }

    /// Selected transfer mode
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Arguments; in temp file mode the slot still holds `%CONFIG%`
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Program to execute
    pub fn program(&self) -> &str {
        // parse() rejects empty argv
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Final argv with the temp file path filled in
    pub fn resolve(&self, config_path: Option<&Path>) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self.argv.iter().map(OsString::from).collect();
        if let (Some(slot), Some(path)) = (&self.slot, config_path) {
            let mut arg = OsString::from(&slot.prefix);
            arg.push(path);
            arg.push(&slot.suffix);
            argv[slot.index] = arg;
        }
        argv
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

fn substitute_id(text: &str, id: &str) -> String {
    text.replace(ID_MACRO, id)
}

fn split_args(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

/// Split around a bare `%CONFIG%`, keeping any text glued to the macro
/// (e.g. `--file=%CONFIG%`) in the same argument
fn split_around_slot(before: &str, after: &str) -> CommandTemplate {
    let mut argv = split_args(before);
    let prefix = if before.ends_with(|c: char| !c.is_whitespace()) {
        argv.pop().unwrap_or_default()
    } else {
        String::new()
    };

    let mut rest = after.split_whitespace().map(String::from);
    let suffix = if after.starts_with(|c: char| !c.is_whitespace()) {
        rest.next().unwrap_or_default()
    } else {
        String::new()
    };

    let index = argv.len();
    argv.push(format!("{prefix}{CONFIG_MACRO}{suffix}"));
    argv.extend(rest);

    CommandTemplate {
        argv,
        mode: TransferMode::TempFile,
        slot: Some(ConfigSlot {
            index,
            prefix,
            suffix,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(template: &str) -> CommandTemplate {
        CommandTemplate::parse(template, "pkg-42").unwrap()
    }

    #[test]
    fn test_stdin_mode() {
        let cmd = parse("tool <%CONFIG% --id %ID%");
        assert_eq!(cmd.mode(), TransferMode::Stdin);
        assert_eq!(cmd.argv(), ["tool", "--id", "pkg-42"]);
        assert!(cmd.argv().iter().all(|a| !a.contains(CONFIG_MACRO)));
    }

    #[test]
    fn test_stdout_mode_with_whitespace() {
        let cmd = parse("  tool render --id=%ID%  >  %CONFIG%  ");
        assert_eq!(cmd.mode(), TransferMode::Stdout);
        assert_eq!(cmd.argv(), ["tool", "render", "--id=pkg-42"]);
    }

    #[test]
    fn test_tempfile_mode() {
        let cmd = parse("tool %CONFIG% %ID%");
        assert_eq!(cmd.mode(), TransferMode::TempFile);
        assert_eq!(cmd.argv(), ["tool", CONFIG_MACRO, "pkg-42"]);

        let argv = cmd.resolve(Some(Path::new("/tmp/x.json")));
        assert_eq!(argv, ["tool", "/tmp/x.json", "pkg-42"]);
    }

    #[test]
    fn test_tempfile_glued_argument() {
        let cmd = parse("tool --file=%CONFIG%.bak --id %ID%");
        assert_eq!(cmd.argv(), ["tool", "--file=%CONFIG%.bak", "--id", "pkg-42"]);

        let argv = cmd.resolve(Some(Path::new("/tmp/c.json")));
        assert_eq!(argv, ["tool", "--file=/tmp/c.json.bak", "--id", "pkg-42"]);
    }

    #[test]
    fn test_direct_exec() {
        let cmd = parse("tool sync %ID% %ID%");
        assert_eq!(cmd.mode(), TransferMode::None);
        assert_eq!(cmd.argv(), ["tool", "sync", "pkg-42", "pkg-42"]);
        assert_eq!(cmd.program(), "tool");
        assert_eq!(cmd.to_string(), "tool sync pkg-42 pkg-42");
    }

    #[test]
    fn test_id_macro_inside_config_argument_area() {
        let cmd = CommandTemplate::parse("tool %CONFIG% %ID%", "%CONFIG%").unwrap();
        assert_eq!(cmd.mode(), TransferMode::TempFile);
        let argv = cmd.resolve(Some(Path::new("/f")));
        assert_eq!(argv, ["tool", "/f", "%CONFIG%"]);
    }

    #[test]
    fn test_multiple_config_macros_rejected() {
        let err = CommandTemplate::parse("tool <%CONFIG% %CONFIG%", "x").unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn test_conflicting_modifiers_rejected() {
        for template in ["tool <>%CONFIG%", "tool > < %CONFIG%", "tool <<%CONFIG%"] {
            let err = CommandTemplate::parse(template, "x").unwrap_err();
            assert!(matches!(err, Error::Template { .. }), "template {template:?}");
        }
    }

    #[test]
    fn test_empty_command_rejected() {
        for template in ["", "   ", "<%CONFIG%", " > %CONFIG% "] {
            let err = CommandTemplate::parse(template, "x").unwrap_err();
            assert!(matches!(err, Error::Template { .. }), "template {template:?}");
        }
    }

    #[test]
    fn test_transfer_mode_reloads() {
        assert!(TransferMode::Stdout.reloads());
        assert!(TransferMode::TempFile.reloads());
        assert!(!TransferMode::Stdin.reloads());
        assert!(!TransferMode::None.reloads());
        assert_eq!(TransferMode::TempFile.to_string(), "tempfile");
    }
}
