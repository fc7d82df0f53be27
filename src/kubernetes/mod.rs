// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and installation.

pub mod crd;

pub use crd::{crd_manifests, wait_for_crds};
