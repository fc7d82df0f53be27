// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering of the TOML config file and start script shipped to tier pods.

use crate::constants::{paths, pod};
use crate::error::{Result, StrataError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write;
use toml::{Table, Value};

/// Render the tier config: the user's raw TOML overlaid with the keys the
/// operator manages. Operator keys always win.
pub fn render<T: Serialize>(managed: &T, user: Option<&str>) -> Result<String> {
    let managed = Table::try_from(managed)
        .map_err(|e| StrataError::BuildError(format!("cannot encode config: {}", e)))?;

    let mut table = match user {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<Table>()
            .map_err(|e| StrataError::BuildError(format!("invalid config override: {}", e)))?,
        _ => Table::new(),
    };
    merge(&mut table, managed);

    toml::to_string(&table)
        .map_err(|e| StrataError::BuildError(format!("cannot render config: {}", e)))
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(nested)) => merge(existing, nested),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Fingerprint of config map data as 16 hex chars of its SHA-256.
///
/// The value is persisted on pod templates, so it must not depend on the
/// toolchain that built the operator.
pub fn fingerprint(data: Option<&BTreeMap<String, String>>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data.into_iter().flatten() {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    hasher.finalize()[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        })
}

/// Shell entrypoint deriving the pod's identity and address before starting
/// the service.
///
/// `component_id` keeps UUIDs of different tiers apart.
pub fn start_script(component_id: u32, port: i32) -> String {
    format!(
        r#"#!/bin/sh
set -eu

POD_NAME=${{{pod_name}:-$HOSTNAME}}
ADDR="${{POD_NAME}}.${{{headless}}}.${{{namespace}}}.svc"
ORDINAL=${{POD_NAME##*-}}
UUID=$(printf '{component_id:08x}-0000-0000-0000-%012x' "${{ORDINAL}}")
conf=$(mktemp)

cat <<EOF > "${{conf}}"
uuid = "${{UUID}}"
service-address = "${{ADDR}}:{port}"
listen-address = "0.0.0.0:{port}"
EOF
cat {config_path}/{config_file} >> "${{conf}}"

# the pod's DNS record may lag behind the pod itself
elapsed=0
until nslookup "${{ADDR}}" >/dev/null 2>&1; do
    elapsed=$((elapsed + 1))
    if [ "${{elapsed}}" -ge 30 ]; then
        echo "timed out waiting for ${{ADDR}} to resolve" >&2
        exit 1
    fi
    sleep 1
done

exec {binary} -cfg "${{conf}}"
"#,
        pod_name = pod::ENV_POD_NAME,
        headless = pod::ENV_HEADLESS_SERVICE,
        namespace = pod::ENV_NAMESPACE,
        component_id = component_id,
        port = port,
        config_path = paths::CONFIG_PATH,
        config_file = paths::CONFIG_FILE,
        binary = pod::BINARY,
    )
}
