//! Output classification
//!
//! Some Ceph commands only tell success from an expected alternative through
//! their text. Each classifier here owns the exact strings it matches so the
//! rules can be tested without a transport.

use super::types::{FlagAction, HostEntry, MaintenanceTransition, OsdFlag};
use super::CephError;
use crate::remote::RemoteError;

/// Marker in `ceph orch host maintenance enter` output for a host that is
/// already in maintenance
pub const ALREADY_IN_MAINTENANCE: &str = "already in maintenance";

/// Marker in `ceph orch host maintenance exit` output for a host that is not
/// in maintenance
pub const NOT_IN_MAINTENANCE: &str = "not in maintenance mode";

/// Check `ceph osd set|unset <flag> 2>&1` output against the exact sentinel.
/// Surrounding whitespace is ignored; anything else is a verification failure.
pub fn verify_flag_output(
    flag: OsdFlag,
    action: FlagAction,
    output: &str,
) -> Result<(), CephError> {
    let expected = flag.sentinel(action);
    let actual = output.trim();

    if actual != expected {
        return Err(CephError::FlagNotVerified {
            flag: flag.as_str(),
            action: action.verb(),
            expected,
            actual: actual.to_string(),
        });
    }

    Ok(())
}

/// Classify the result of `ceph orch host maintenance enter <host> 2>&1`.
///
/// Matches `"already in maintenance"` in the combined output, which Ceph
/// prints alongside a non-zero exit.
pub fn classify_enter_maintenance(
    result: Result<String, RemoteError>,
) -> Result<MaintenanceTransition, CephError> {
    classify_maintenance(
        result,
        "ceph orch host maintenance enter",
        ALREADY_IN_MAINTENANCE,
        MaintenanceTransition::Entered,
        MaintenanceTransition::AlreadyInMaintenance,
    )
}

/// Classify the result of `ceph orch host maintenance exit <host> 2>&1`.
///
/// Matches `"not in maintenance mode"` in the combined output.
pub fn classify_exit_maintenance(
    result: Result<String, RemoteError>,
) -> Result<MaintenanceTransition, CephError> {
    classify_maintenance(
        result,
        "ceph orch host maintenance exit",
        NOT_IN_MAINTENANCE,
        MaintenanceTransition::Exited,
        MaintenanceTransition::NotInMaintenance,
    )
}

fn classify_maintenance(
    result: Result<String, RemoteError>,
    operation: &'static str,
    marker: &str,
    changed: MaintenanceTransition,
    unchanged: MaintenanceTransition,
) -> Result<MaintenanceTransition, CephError> {
    match result {
        Ok(output) if output.contains(marker) => Ok(unchanged),
        Ok(_) => Ok(changed),
        Err(e) if e.output().is_some_and(|out| out.contains(marker)) => Ok(unchanged),
        Err(e) => Err(CephError::Command {
            operation,
            source: e,
        }),
    }
}

/// Decide from `ceph orch host ls --format json` whether `host` is in
/// maintenance. A host missing from the listing is not in maintenance.
pub fn parse_maintenance_status(json: &str, host: &str) -> Result<bool, CephError> {
    let hosts: Vec<HostEntry> = serde_json::from_str(json)?;
    Ok(hosts
        .iter()
        .any(|h| h.hostname.eq_ignore_ascii_case(host) && h.in_maintenance()))
}
