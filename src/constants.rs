// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group served by the strata CRDs
pub const API_GROUP: &str = "core.strata.dev";
pub const API_VERSION: &str = "v1alpha1";

/// The operator name used as field manager and in labels
pub const OPERATOR_NAME: &str = "strata";

/// Finalizer guarding teardown of owned sub-resources
pub const FINALIZER: &str = "core.strata.dev/finalizer";

/// Kubernetes label keys put on every sub-resource
pub mod labels {
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const INSTANCE: &str = "app.kubernetes.io/instance";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
}

/// Status condition types and reasons
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const SYNCED: &str = "Synced";

    pub mod reasons {
        pub const DEPENDENCY_NOT_READY: &str = "DependencyNotReady";
        pub const BUILD_FAILED: &str = "BuildFailed";
        pub const RECONCILING: &str = "Reconciling";
        pub const ACTION_FAILED: &str = "ActionFailed";
        pub const SYNCED: &str = "Synced";
        pub const PODS_READY: &str = "PodsReady";
        pub const PODS_NOT_READY: &str = "PodsNotReady";
        pub const TIERS_READY: &str = "TiersReady";
        pub const TIERS_NOT_READY: &str = "TiersNotReady";
    }
}

/// Tier component names, also used as cluster name suffixes
pub mod components {
    pub const LOG: &str = "log";
    pub const DN: &str = "dn";
    pub const CN: &str = "cn";
}

/// Well-known ports of the database services
pub mod ports {
    pub const LOG_SERVICE: i32 = 32000;
    pub const COORDINATION: i32 = 32001;
    pub const LOG_GOSSIP: i32 = 32002;
    pub const DN_SERVICE: i32 = 41010;
    pub const CN_SQL: i32 = 6001;
}

/// Mount points and file names inside tier pods
pub mod paths {
    pub const DATA_VOLUME: &str = "data";
    pub const DATA_PATH: &str = "/var/lib/strata";
    pub const CONFIG_VOLUME: &str = "config";
    pub const CONFIG_PATH: &str = "/etc/strata";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const START_SCRIPT: &str = "start.sh";
}

/// Upper bound on coordination replicas listed for clients
pub const MAX_COORDINATION_REPLICAS: i32 = 3;

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

pub mod annotations {
    /// Fingerprint of the rendered config, rolls pods when it changes
    pub const CONFIG_HASH: &str = "core.strata.dev/config-hash";
}

/// Pod template details shared by all tiers
pub mod pod {
    pub const MAIN_CONTAINER: &str = "main";
    pub const ENV_POD_NAME: &str = "POD_NAME";
    pub const ENV_NAMESPACE: &str = "NAMESPACE";
    pub const ENV_POD_IP: &str = "POD_IP";
    pub const ENV_HEADLESS_SERVICE: &str = "HEADLESS_SERVICE_NAME";
    pub const BINARY: &str = "/strata-service";
}
