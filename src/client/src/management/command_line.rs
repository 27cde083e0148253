//! Launch-command surgery shared by all management types: quote-aware
//! splitting of the invocation prefix, and insertion/removal of the
//! identification marker and instrumentation arguments.

use once_cell::sync::Lazy;
use regex::Regex;
use scout_common::constants::IDENTITY_FLAG;

const QUOTE: char = '"';

static IDENTITY_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s-Dscout\.record\.id=\S+").expect("identity marker regex"));

// Everything this agent ever injects, so removal restores the operator's
// original command instead of leaving half the argument block behind.
static INJECTED_ARGS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\s-javaagent:\S+|\s-Dscout\.instrument\.configuration=\S+|\s-Dscout\.instrument\.weaving=\S+|\s-Dscout\.instrument\.skipDefaultWeaving=\S+|\s-Dscout\.record\.id=\S+",
    )
    .expect("injected arguments regex")
});

pub fn identity_marker(id: &str) -> String {
    format!("{IDENTITY_FLAG}{id}")
}

/// Splits a launch command into its invocation prefix and the remainder.
///
/// Some OS launchers substitute a quoted absolute path for the launcher
/// token, and that path may contain whitespace. Splitting at the first
/// whitespace would fragment it, so a command opening with a quote is split
/// at the matching closing quote instead. Returns `None` when the command
/// has no remainder (or no closing quote) - there is nowhere to inject.
pub fn split_launch_command(command: &str) -> Option<(String, String)> {
    if let Some(quoted) = command.strip_prefix(QUOTE) {
        let (path, rest) = quoted.split_once(QUOTE)?;
        let remainder = rest.trim_start();
        if remainder.is_empty() {
            return None;
        }
        Some((format!("{QUOTE}{path}{QUOTE}"), remainder.to_string()))
    } else {
        let (prefix, rest) = command.split_once(char::is_whitespace)?;
        let remainder = rest.trim_start();
        if remainder.is_empty() {
            return None;
        }
        Some((prefix.to_string(), remainder.to_string()))
    }
}

/// The launcher token alone, tolerating single-token commands.
pub fn invocation_prefix(command: &str) -> Option<String> {
    match split_launch_command(command) {
        Some((prefix, _)) => Some(prefix),
        None if command.trim().is_empty() => None,
        None => Some(command.trim().to_string()),
    }
}

/// Inserts `insertion` between the invocation prefix and the remainder.
pub fn inject_after_prefix(command: &str, insertion: &str) -> Option<String> {
    let (prefix, remainder) = split_launch_command(command)?;
    Some(format!("{prefix} {insertion} {remainder}"))
}

/// Removes the first identification marker, if any.
pub fn strip_identity_marker(command: &str) -> String {
    IDENTITY_MARKER_RE.replace(command, "").into_owned()
}

/// Removes the identification marker and every instrumentation argument this
/// agent injects, restoring the operator's command up to whitespace.
pub fn strip_instrumentation(command: &str) -> String {
    INJECTED_ARGS_RE.replace_all(command, "").into_owned()
}

/// The full instrumentation argument block, marker last: hook library,
/// generated runtime config, generated weaving config, and the flag that
/// keeps the runtime's default weaving rules out of the way.
pub fn instrumentation_arguments(
    library: &str,
    runtime_config: &str,
    weaving_config: &str,
    id: &str,
) -> String {
    format!(
        "-javaagent:{library} -Dscout.instrument.configuration={runtime_config} -Dscout.instrument.weaving=file://{weaving_config} -Dscout.instrument.skipDefaultWeaving=true {}",
        identity_marker(id)
    )
}
