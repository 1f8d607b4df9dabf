//! Built-in filters
//!
//! All of them are exclusive filters: the declarative rules name what to
//! protect, the heuristic names what needs action.

mod httpurl;
mod idle;
mod license;
mod longrunning;
mod ownerless;
mod version;

pub use httpurl::HttpUrlFilter;
pub use idle::IdleFilter;
pub use license::{LicenseFilter, INVALID_LICENSE_MESSAGE, LICENSE_GRACE_DAYS, VERSION_PATH};
pub use longrunning::LongRunningFilter;
pub use ownerless::OwnerlessFilter;
pub use version::{VersionFilter, MIN_PATCHED_VERSION, PATCHED_VERSIONS};

use super::Verdict;
use crate::models::{CloudItem, State};
use tracing::{debug, warn};

/// Log and skip an item of a kind the filter has no rule for
pub(crate) fn unsupported(filter: &str, item: &CloudItem) -> Verdict {
    warn!(
        filter,
        item = %item.name(),
        kind = %item.kind(),
        "Filter does not apply for cloud item"
    );
    Verdict::Skip
}

/// Address of a running instance, or `None` when it cannot be probed
pub(crate) fn probe_address<'a>(filter: &str, item: &'a CloudItem) -> Option<&'a str> {
    let Some(instance) = item.as_instance() else {
        unsupported(filter, item);
        return None;
    };
    if instance.state != State::Running {
        debug!(
            filter,
            item = %item.name(),
            state = ?instance.state,
            "Instance is not running, skipping"
        );
        return None;
    }
    match instance.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
        Some(ip) => Some(ip),
        None => {
            debug!(filter, item = %item.name(), "Instance has no address, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use crate::models::Provider;

    #[test]
    fn test_probe_address() {
        let running = instance_in_state("a", State::Running, Some("10.0.0.2"));
        let stopped = instance_in_state("b", State::Stopped, Some("10.0.0.3"));
        let no_ip = instance_in_state("c", State::Running, None);
        let db = database("d", Provider::Aws, &[]);

        assert_eq!(probe_address("test", &running), Some("10.0.0.2"));
        assert_eq!(probe_address("test", &stopped), None);
        assert_eq!(probe_address("test", &no_ip), None);
        assert_eq!(probe_address("test", &db), None);
    }
}
