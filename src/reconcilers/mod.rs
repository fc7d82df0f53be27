// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kind specific actors plugged into the reconciliation engine.

pub mod cluster;
pub mod cnset;
pub mod dnset;
pub mod logset;
pub mod tier;

pub use cluster::ClusterActor;
pub use cnset::CNSetActor;
pub use dnset::DNSetActor;
pub use logset::LogSetActor;
