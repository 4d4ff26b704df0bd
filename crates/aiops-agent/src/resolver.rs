//! Resource identifier resolution.
//!
//! Maps a free-text identifier to exactly one concrete resource. Tried in
//! order, first success wins:
//!
//! 1. native ID shape: must exist and be active
//! 2. exact display-name match among active resources
//! 3. fuzzy match: separators stripped, lower-cased, containment either way
//!
//! Exact collisions and multiple fuzzy hits are `Ambiguous`; the resolver
//! never picks one. Misses list every available name.

use aiops_cloud::{CloudApi, CloudError};
use aiops_protocol::{ResourceKind, ResourceRef, ResourceSummary};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("{kind} '{query}' not found")]
    NotFound {
        kind: ResourceKind,
        query: String,
        available: Vec<String>,
    },

    #[error("'{query}' matches more than one {kind}")]
    Ambiguous {
        kind: ResourceKind,
        query: String,
        candidates: Vec<String>,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub reference: ResourceRef,
    /// Display name of the resolved resource (may be empty).
    pub name: String,
    /// True when only the fuzzy step matched.
    pub partial_match: bool,
}

pub struct Resolver<'a> {
    cloud: &'a dyn CloudApi,
}

impl<'a> Resolver<'a> {
    pub fn new(cloud: &'a dyn CloudApi) -> Self {
        Self { cloud }
    }

    pub async fn resolve(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> Result<Resolved, ResolveError> {
        let resources = self.cloud.list_resources(kind).await?;
        resolve_among(kind, identifier, &resources)
    }
}

/// Pure resolution over an already-fetched resource list.
pub fn resolve_among(
    kind: ResourceKind,
    identifier: &str,
    resources: &[ResourceSummary],
) -> Result<Resolved, ResolveError> {
    let active: Vec<&ResourceSummary> = resources.iter().filter(|r| r.active).collect();
    let query = identifier
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c.is_whitespace());

    let not_found = || ResolveError::NotFound {
        kind,
        query: query.to_string(),
        available: available_names(&active),
    };

    if query.is_empty() {
        return Err(not_found());
    }

    if kind.matches_native_id(query) {
        return active
            .iter()
            .find(|r| r.id == query)
            .map(|r| found(r, false))
            .ok_or_else(not_found);
    }

    let exact: Vec<&&ResourceSummary> = active.iter().filter(|r| r.name == query).collect();
    match exact.as_slice() {
        [one] => return Ok(found(one, false)),
        [] => {}
        many => {
            return Err(ResolveError::Ambiguous {
                kind,
                query: query.to_string(),
                candidates: sorted_ids(many.iter().map(|r| r.id.as_str())),
            });
        }
    }

    let needle = fuzzy_key(query);
    if needle.is_empty() {
        return Err(not_found());
    }
    let partial: Vec<&&ResourceSummary> = active
        .iter()
        .filter(|r| {
            let hay = fuzzy_key(&r.name);
            !hay.is_empty() && (hay.contains(&needle) || needle.contains(&hay))
        })
        .collect();

    match partial.as_slice() {
        [] => Err(not_found()),
        [one] => {
            tracing::debug!(query = %query, id = %one.id, name = %one.name, "partial name match");
            Ok(found(one, true))
        }
        many => Err(ResolveError::Ambiguous {
            kind,
            query: query.to_string(),
            candidates: sorted_ids(many.iter().map(|r| r.id.as_str())),
        }),
    }
}

fn found(r: &ResourceSummary, partial_match: bool) -> Resolved {
    Resolved {
        reference: ResourceRef::new(r.kind, r.id.clone()),
        name: r.name.clone(),
        partial_match,
    }
}

fn fuzzy_key(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn available_names(active: &[&ResourceSummary]) -> Vec<String> {
    let mut names: Vec<String> = active
        .iter()
        .filter(|r| !r.name.is_empty())
        .map(|r| r.name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn sorted_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut ids: Vec<String> = ids.map(String::from).collect();
    ids.sort();
    ids
}
