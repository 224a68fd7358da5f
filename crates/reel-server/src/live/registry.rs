//! Client registry owned by the broker actor.
//!
//! Two structures are kept in lockstep: the primary `id → client` map and the
//! `project → ids` index. An ID is in the primary map iff it is in exactly one
//! project bucket. Empty buckets are pruned.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use reel_core::{ClientId, ProjectId};
use serde::Serialize;

use super::client::Client;

/// Point-in-time client counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStats {
    /// Registered clients across all projects.
    pub total_clients: usize,
    /// Registered clients per project (projects without clients are absent).
    pub projects: BTreeMap<ProjectId, usize>,
}

impl BrokerStats {
    /// Clients registered under `project`.
    pub fn project_clients(&self, project: ProjectId) -> usize {
        self.projects.get(&project).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    clients: HashMap<ClientId, Arc<Client>>,
    projects: HashMap<ProjectId, HashSet<ClientId>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `client`, returning the client it replaced (same ID), if any.
    pub(crate) fn insert(&mut self, client: Arc<Client>) -> Option<Arc<Client>> {
        let previous = self.remove(client.id());
        let id = client.id().clone();
        let _ = self
            .projects
            .entry(client.project_id())
            .or_default()
            .insert(id.clone());
        let _ = self.clients.insert(id, client);
        previous
    }

    /// Unregister `id`. Unknown IDs are a no-op.
    pub(crate) fn remove(&mut self, id: &ClientId) -> Option<Arc<Client>> {
        let client = self.clients.remove(id)?;
        let project = client.project_id();
        if let Some(bucket) = self.projects.get_mut(&project) {
            let _ = bucket.remove(id);
            if bucket.is_empty() {
                let _ = self.projects.remove(&project);
            }
        }
        Some(client)
    }

    /// Unregister `id` only if it is still bound to `expected`.
    pub(crate) fn remove_if_same(
        &mut self,
        id: &ClientId,
        expected: &Arc<Client>,
    ) -> Option<Arc<Client>> {
        let current = self.clients.get(id)?;
        if !Arc::ptr_eq(current, expected) {
            return None;
        }
        self.remove(id)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Owned copy of the clients subscribed to `project`.
    pub(crate) fn project_snapshot(&self, project: ProjectId) -> Vec<Arc<Client>> {
        self.projects
            .get(&project)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.clients.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Owned copy of every client.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Client>> {
        self.clients.values().cloned().collect()
    }

    /// Remove and return every client.
    pub(crate) fn drain(&mut self) -> Vec<Arc<Client>> {
        self.projects.clear();
        self.clients.drain().map(|(_, client)| client).collect()
    }

    pub(crate) fn stats(&self) -> BrokerStats {
        BrokerStats {
            total_clients: self.clients.len(),
            projects: self
                .projects
                .iter()
                .map(|(project, ids)| (*project, ids.len()))
                .collect(),
        }
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let indexed: usize = self.projects.values().map(HashSet::len).sum();
        assert_eq!(indexed, self.clients.len(), "index size mismatch");
        for (project, ids) in &self.projects {
            assert!(!ids.is_empty(), "empty bucket for {project}");
            for id in ids {
                let client = self.clients.get(id).expect("indexed id missing from map");
                assert_eq!(client.project_id(), *project, "{id} in wrong bucket");
            }
        }
    }
}
