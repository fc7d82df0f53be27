// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::conditions::{READY, SYNCED};
use crate::error::Result;
use crate::store::{ObjectKey, ObjectStore};
use crate::types::condition::is_condition_true;
use crate::types::{Condition, Conditioned, DNSet, LogSet};
use std::fmt;

/// Resource kinds other resources can wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    LogSet,
    DNSet,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogSet => write!(f, "LogSet"),
            Self::DNSet => write!(f, "DNSet"),
        }
    }
}

/// Decides from a dependency's conditions whether it is usable
pub type ReadyPredicate = fn(&[Condition]) -> bool;

pub fn ready(conditions: &[Condition]) -> bool {
    is_condition_true(conditions, READY)
}

pub fn ready_and_synced(conditions: &[Condition]) -> bool {
    is_condition_true(conditions, READY) && is_condition_true(conditions, SYNCED)
}

#[derive(Clone)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub key: ObjectKey,
    pub predicate: ReadyPredicate,
}

impl Dependency {
    pub fn new(kind: DependencyKind, key: ObjectKey, predicate: ReadyPredicate) -> Self {
        Self {
            kind,
            key,
            predicate,
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    Absent,
    NotReady,
}

#[derive(Debug)]
pub enum DependencyState {
    Satisfied,
    /// The first dependency, in declaration order, that is not usable
    Waiting {
        dependency: Dependency,
        reason: WaitReason,
    },
}

impl DependencyState {
    pub fn message(&self) -> String {
        match self {
            Self::Satisfied => "all dependencies ready".to_string(),
            Self::Waiting {
                dependency,
                reason: WaitReason::Absent,
            } => format!("waiting for {} to be created", dependency),
            Self::Waiting {
                dependency,
                reason: WaitReason::NotReady,
            } => format!("waiting for {} to become ready", dependency),
        }
    }
}

async fn conditions_of<S: ObjectStore>(
    store: &S,
    dependency: &Dependency,
) -> Result<Option<Vec<Condition>>> {
    Ok(match dependency.kind {
        DependencyKind::LogSet => store
            .get::<LogSet>(&dependency.key)
            .await?
            .map(|o| o.conditions().to_vec()),
        DependencyKind::DNSet => store
            .get::<DNSet>(&dependency.key)
            .await?
            .map(|o| o.conditions().to_vec()),
    })
}

/// Check every dependency against its predicate. Store errors fail the
/// resolution as a whole.
pub async fn resolve<S: ObjectStore>(store: &S, dependencies: &[Dependency]) -> Result<DependencyState> {
    for dependency in dependencies {
        let reason = match conditions_of(store, dependency).await? {
            None => Some(WaitReason::Absent),
            Some(conditions) if !(dependency.predicate)(&conditions) => Some(WaitReason::NotReady),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Ok(DependencyState::Waiting {
                dependency: dependency.clone(),
                reason,
            });
        }
    }
    Ok(DependencyState::Satisfied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_dn_set, make_log_set, MemoryStore, Op};
    use crate::types::ConditionStatus;

    fn condition(condition_type: &str, status: ConditionStatus) -> Condition {
        Condition::new(condition_type, status, "Test", "")
    }

    async fn ready_log_set(store: &MemoryStore, name: &str) {
        let mut ls = store.create(&make_log_set(name, 3)).await.unwrap();
        ls.set_condition(condition(READY, ConditionStatus::True));
        ls.set_condition(condition(SYNCED, ConditionStatus::True));
        store.update_status(&ls).await.unwrap();
    }

    #[test]
    fn test_predicates() {
        let ready_only = vec![condition(READY, ConditionStatus::True)];
        let both = vec![
            condition(READY, ConditionStatus::True),
            condition(SYNCED, ConditionStatus::True),
        ];
        assert!(ready(&ready_only));
        assert!(!ready_and_synced(&ready_only));
        assert!(ready_and_synced(&both));
        assert!(!ready(&[]));
    }

    #[tokio::test]
    async fn test_no_dependencies_is_satisfied() {
        let store = MemoryStore::default();
        let state = resolve(&store, &[]).await.unwrap();
        assert!(matches!(state, DependencyState::Satisfied));
    }

    #[tokio::test]
    async fn test_absent_dependency() {
        let store = MemoryStore::default();
        let deps = vec![Dependency::new(
            DependencyKind::LogSet,
            ObjectKey::new("databases", "demo-log"),
            ready_and_synced,
        )];
        let state = resolve(&store, &deps).await.unwrap();
        assert!(matches!(
            state,
            DependencyState::Waiting {
                reason: WaitReason::Absent,
                ..
            }
        ));
        assert_eq!(state.message(), "waiting for LogSet databases/demo-log to be created");
    }

    #[tokio::test]
    async fn test_all_dependencies_must_hold() {
        let store = MemoryStore::default();
        ready_log_set(&store, "demo-log").await;
        store
            .create(&make_dn_set("demo-dn", 1, Some("demo-log")))
            .await
            .unwrap();

        let deps = vec![
            Dependency::new(
                DependencyKind::LogSet,
                ObjectKey::new("databases", "demo-log"),
                ready_and_synced,
            ),
            Dependency::new(
                DependencyKind::DNSet,
                ObjectKey::new("databases", "demo-dn"),
                ready,
            ),
        ];
        match resolve(&store, &deps).await.unwrap() {
            DependencyState::Waiting { dependency, reason } => {
                assert_eq!(dependency.kind, DependencyKind::DNSet);
                assert_eq!(reason, WaitReason::NotReady);
            }
            DependencyState::Satisfied => panic!("DNSet is not ready"),
        }
    }

    #[tokio::test]
    async fn test_satisfied_when_ready() {
        let store = MemoryStore::default();
        ready_log_set(&store, "demo-log").await;
        let deps = vec![Dependency::new(
            DependencyKind::LogSet,
            ObjectKey::new("databases", "demo-log"),
            ready_and_synced,
        )];
        assert!(matches!(
            resolve(&store, &deps).await.unwrap(),
            DependencyState::Satisfied
        ));
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let store = MemoryStore::default();
        let key = ObjectKey::new("databases", "demo-log");
        store.fail_next(Op::Get, key.clone());
        let deps = vec![Dependency::new(DependencyKind::LogSet, key, ready)];
        assert!(resolve(&store, &deps).await.is_err());
    }
}
