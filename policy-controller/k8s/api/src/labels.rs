use std::collections::BTreeMap;

/// Identifies the controller replica that owns a `ConfigPodStatus`.
pub const POD_LABEL: &str = "status.policy-sync.io/pod";

/// Identifies the `Config` a `ConfigPodStatus` reports on.
pub const CONFIG_LABEL: &str = "status.policy-sync.io/config";

pub fn pod_status(pod: &str, config: &str) -> BTreeMap<String, String> {
    [
        (POD_LABEL.to_string(), pod.to_string()),
        (CONFIG_LABEL.to_string(), config.to_string()),
    ]
    .into_iter()
    .collect()
}
