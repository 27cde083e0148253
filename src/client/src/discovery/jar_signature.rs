use scout_common::constants::{IDENTITY_FLAG, USE_OS_COMMAND};
use scout_common::types::ProcessRecord;

use crate::discovery::DiscoveryStrategy;

const JAR_DELIMITER: &str = "-jar ";

/// Matches applications launched as `java ... -jar <archive>` whose command
/// contains a configured signature, and proposes a launch command with the
/// archive path absolutized against the working directory (the OS often
/// reports the relative path the operator typed).
pub struct JarSignatureStrategy {
    signature: String,
    display_name: String,
}

impl JarSignatureStrategy {
    pub fn new(signature: String, display_name: String) -> Self {
        JarSignatureStrategy {
            signature,
            display_name,
        }
    }
}

impl DiscoveryStrategy for JarSignatureStrategy {
    fn matches(&self, record: &ProcessRecord) -> bool {
        record.os_execution_command.contains(&self.signature)
    }

    fn apply(&self, record: &mut ProcessRecord) -> bool {
        if !self.matches(record) {
            return false;
        }

        record.name.clone_from(&self.display_name);

        if record.os_execution_command.contains(IDENTITY_FLAG) {
            // already relaunched by an agent once, the observed command is
            // the normalized one
            record.proposed_execution_command = USE_OS_COMMAND.to_string();
        } else if !record.working_directory.is_empty() {
            if let Some((head, tail)) = record.os_execution_command.split_once(JAR_DELIMITER) {
                record.proposed_execution_command = format!(
                    "{head}{JAR_DELIMITER}{}/{}",
                    record.working_directory.trim_end_matches('/'),
                    tail.trim()
                );
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> JarSignatureStrategy {
        JarSignatureStrategy::new("sample-app".into(), "Sample App".into())
    }

    fn record(command: &str, workdir: &str) -> ProcessRecord {
        let mut record = ProcessRecord::discovered(100, command.into(), "linux-jvm".into());
        record.working_directory = workdir.into();
        record
    }

    #[test]
    fn proposes_absolutized_jar_path() {
        let mut r = record("java -jar sample-app.jar", "/opt/sample");

        assert!(strategy().apply(&mut r));
        assert_eq!(r.name, "Sample App");
        assert_eq!(
            r.proposed_execution_command,
            "java -jar /opt/sample/sample-app.jar"
        );
    }

    #[test]
    fn marked_commands_propose_keeping_the_os_command() {
        let mut r = record(
            "java -Dscout.record.id=4711 -jar sample-app.jar",
            "/opt/sample",
        );

        assert!(strategy().apply(&mut r));
        assert_eq!(r.proposed_execution_command, USE_OS_COMMAND);
    }

    #[test]
    fn missing_working_directory_skips_the_proposal() {
        let mut r = record("java -jar sample-app.jar", "");

        assert!(strategy().apply(&mut r));
        assert_eq!(r.name, "Sample App");
        assert!(r.proposed_execution_command.is_empty());
    }

    #[test]
    fn non_matching_record_is_untouched() {
        let mut r = record("java -jar other.jar", "/opt");

        assert!(!strategy().apply(&mut r));
        assert!(r.name.is_empty());
    }
}
