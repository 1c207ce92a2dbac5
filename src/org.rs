//! Organization hierarchy rollup
//!
//! Resolves every organizational unit to its top-level root unit by walking
//! parent pointers. A unit whose id ends in the configured root suffix (and is
//! not the universal root) is a root candidate; every other unit resolves to
//! the nearest root candidate above it. Units that never reach one, sit on a
//! cycle, or exceed the depth cap roll up to the `UNASSIGNED` root.

use crate::config::OrgConfig;
use crate::types::OrgUnit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Root id used when a unit has no resolvable root
pub const UNASSIGNED_ROOT_ID: &str = "UNASSIGNED";

/// Display name of the `UNASSIGNED` root
pub const UNASSIGNED_ROOT_NAME: &str = "undefined";

/// A resolved top-level organization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RootOrg {
    pub root_org_id: String,
    pub root_org_name: String,
}

impl RootOrg {
    pub fn unassigned() -> Self {
        Self {
            root_org_id: UNASSIGNED_ROOT_ID.to_string(),
            root_org_name: UNASSIGNED_ROOT_NAME.to_string(),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.root_org_id == UNASSIGNED_ROOT_ID
    }
}

/// Why a unit could not be resolved to a real root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgFlag {
    /// Parent chain ends without reaching a root candidate
    NoRoot,
    /// Parent chain points at a unit missing from the org source
    MissingParent,
    /// Parent chain revisits a unit
    Cycle,
    /// Parent chain is longer than the configured depth cap
    DepthExceeded,
}

/// A unit that rolled up to `UNASSIGNED` because of a data fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedUnit {
    pub org_id: String,
    pub flag: OrgFlag,
}

/// Cached `unit_id -> root` mapping for one run.
#[derive(Debug, Clone)]
pub struct OrgHierarchyResolver {
    roots: HashMap<String, RootOrg>,
    flagged: Vec<FlaggedUnit>,
}

impl OrgHierarchyResolver {
    /// Resolve every unit once. Org structure is read-only within a run.
    pub fn build(units: &[OrgUnit], config: &OrgConfig) -> Self {
        let by_id: BTreeMap<&str, &OrgUnit> =
            units.iter().map(|u| (u.org_id.as_str(), u)).collect();

        let mut roots = HashMap::with_capacity(by_id.len());
        let mut flagged = Vec::new();

        for org_id in by_id.keys() {
            match resolve_one(org_id, &by_id, config) {
                Ok(root) => {
                    roots.insert(org_id.to_string(), root);
                }
                Err(flag) => {
                    match flag {
                        OrgFlag::Cycle | OrgFlag::DepthExceeded => {
                            warn!(org_id = %org_id, ?flag, "org unit rolled up to UNASSIGNED");
                        }
                        OrgFlag::NoRoot | OrgFlag::MissingParent => {
                            debug!(org_id = %org_id, ?flag, "org unit has no resolvable root");
                        }
                    }
                    flagged.push(FlaggedUnit {
                        org_id: org_id.to_string(),
                        flag,
                    });
                    roots.insert(org_id.to_string(), RootOrg::unassigned());
                }
            }
        }

        Self { roots, flagged }
    }

    /// Root of `unit_id`; unknown or missing units map to `UNASSIGNED`.
    pub fn root_of(&self, unit_id: Option<&str>) -> RootOrg {
        unit_id
            .and_then(|id| self.roots.get(id))
            .cloned()
            .unwrap_or_else(RootOrg::unassigned)
    }

    /// Whether the org source knows `unit_id`.
    pub fn knows(&self, unit_id: &str) -> bool {
        self.roots.contains_key(unit_id)
    }

    /// Units that hit a data fault during resolution, ordered by id.
    pub fn flagged(&self) -> &[FlaggedUnit] {
        &self.flagged
    }
}

fn is_root_candidate(org_id: &str, config: &OrgConfig) -> bool {
    org_id.ends_with(&config.root_suffix)
        && config.universal_root_id.as_deref() != Some(org_id)
}

/// Iterative parent walk with a visited set and a hard depth bound.
fn resolve_one(
    org_id: &str,
    by_id: &BTreeMap<&str, &OrgUnit>,
    config: &OrgConfig,
) -> Result<RootOrg, OrgFlag> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = org_id;

    for _ in 0..=config.max_depth {
        let unit = by_id.get(current).ok_or(OrgFlag::MissingParent)?;

        if is_root_candidate(current, config) {
            return Ok(RootOrg {
                root_org_id: unit.org_id.clone(),
                root_org_name: unit.org_name.clone(),
            });
        }

        visited.insert(current);

        let parent = match unit.parent_org_id.as_deref() {
            Some(parent) if !parent.is_empty() && parent != current => parent,
            Some(parent) if parent == current => return Err(OrgFlag::Cycle),
            _ => return Err(OrgFlag::NoRoot),
        };

        if visited.contains(parent) {
            return Err(OrgFlag::Cycle);
        }
        current = parent;
    }

    Err(OrgFlag::DepthExceeded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, name: &str, parent: Option<&str>) -> OrgUnit {
        OrgUnit {
            org_id: id.to_string(),
            org_name: name.to_string(),
            parent_org_id: parent.map(str::to_string),
        }
    }

    fn config() -> OrgConfig {
        OrgConfig {
            root_suffix: "0000".to_string(),
            universal_root_id: Some("00000000".to_string()),
            max_depth: 100,
        }
    }

    #[test]
    fn test_resolves_nearest_root() {
        let units = vec![
            unit("00000000", "Company", None),
            unit("10000000", "Sales", Some("00000000")),
            unit("10010000", "Sales North", Some("10000000")),
            unit("10010100", "North Team A", Some("10010000")),
            unit("10010101", "North Team A1", Some("10010100")),
        ];
        let resolver = OrgHierarchyResolver::build(&units, &config());

        let root = resolver.root_of(Some("10010101"));
        assert_eq!(root.root_org_id, "10010000");
        assert_eq!(root.root_org_name, "Sales North");
        assert_eq!(resolver.root_of(Some("10000000")).root_org_id, "10000000");
        assert!(resolver.flagged().iter().any(|f| f.org_id == "00000000"));
    }

    #[test]
    fn test_universal_root_is_not_a_candidate() {
        let units = vec![
            unit("00000000", "Company", None),
            unit("00000001", "Board Office", Some("00000000")),
        ];
        let resolver = OrgHierarchyResolver::build(&units, &config());
        assert!(resolver.root_of(Some("00000001")).is_unassigned());
        assert!(resolver.root_of(Some("00000000")).is_unassigned());
    }

    #[test]
    fn test_cycle_maps_to_unassigned() {
        let units = vec![
            unit("A1", "A", Some("B1")),
            unit("B1", "B", Some("C1")),
            unit("C1", "C", Some("A1")),
            unit("S1", "Self", Some("S1")),
        ];
        let resolver = OrgHierarchyResolver::build(&units, &config());

        assert!(resolver.root_of(Some("A1")).is_unassigned());
        assert!(resolver.root_of(Some("S1")).is_unassigned());
        assert!(resolver
            .flagged()
            .iter()
            .all(|f| f.flag == OrgFlag::Cycle));
        assert_eq!(resolver.flagged().len(), 4);
    }

    #[test]
    fn test_depth_cap() {
        let mut units = vec![unit("R0000", "Root", None)];
        let mut parent = "R0000".to_string();
        for i in 0..10 {
            let id = format!("N{i}");
            units.push(unit(&id, &id, Some(&parent)));
            parent = id;
        }
        let shallow = OrgConfig {
            max_depth: 3,
            ..config()
        };

        let resolver = OrgHierarchyResolver::build(&units, &shallow);
        assert_eq!(resolver.root_of(Some("N1")).root_org_id, "R0000");
        assert!(resolver.root_of(Some("N9")).is_unassigned());
        assert!(resolver
            .flagged()
            .iter()
            .any(|f| f.org_id == "N9" && f.flag == OrgFlag::DepthExceeded));

        let deep = OrgHierarchyResolver::build(&units, &config());
        assert_eq!(deep.root_of(Some("N9")).root_org_id, "R0000");
    }

    #[test]
    fn test_missing_parent_and_unknown_unit() {
        let units = vec![unit("X1", "Orphan", Some("GONE"))];
        let resolver = OrgHierarchyResolver::build(&units, &config());

        assert!(resolver.root_of(Some("X1")).is_unassigned());
        assert_eq!(resolver.flagged()[0].flag, OrgFlag::MissingParent);
        assert!(resolver.root_of(Some("NOPE")).is_unassigned());
        assert!(resolver.root_of(None).is_unassigned());
        assert_eq!(resolver.root_of(None).root_org_name, "undefined");
    }
}
