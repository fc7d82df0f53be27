// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources managed by the operator.

pub mod cluster;
pub mod cnset;
pub mod common;
pub mod condition;
pub mod dnset;
pub mod logset;

pub use cluster::{tier_name, StrataCluster, StrataClusterSpec, StrataClusterStatus};
pub use cnset::{CNSet, CNSetBasic, CNSetSpec, CNSetStatus};
pub use common::{ObjectRef, PodSet, Resources, ServiceType, Volume};
pub use condition::{Condition, ConditionStatus, Conditioned};
pub use dnset::{DNSet, DNSetBasic, DNSetSpec, DNSetStatus};
pub use logset::{Discovery, InitialConfig, LogSet, LogSetSpec, LogSetStatus};
