use crate::catalog::{BUILTINS, is_denylisted};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CAPABILITIES: LazyLock<CapabilitySet> = LazyLock::new(CapabilitySet::build);

/// The built-ins policies are allowed to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    builtins: BTreeSet<&'static str>,
}

impl CapabilitySet {
    /// The full catalog minus the denylist.
    pub fn build() -> Self {
        Self {
            builtins: BUILTINS
                .iter()
                .copied()
                .filter(|name| !is_denylisted(name))
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn builtins(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }
}

/// The process-wide capability set, built on first use.
pub fn capabilities() -> &'static CapabilitySet {
    &CAPABILITIES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DENYLIST;

    #[test]
    fn test_denylist_is_removed() {
        let caps = CapabilitySet::build();
        for name in DENYLIST {
            assert!(!caps.contains(name), "{name} must not be callable");
        }
        assert_eq!(caps.len(), BUILTINS.len() - DENYLIST.len());
    }

    #[test]
    fn test_common_builtins_survive() {
        let caps = capabilities();
        for name in ["count", "print", "opa.runtime", "rand.intn", "net.cidr_contains"] {
            assert!(caps.contains(name), "{name}");
        }
    }

    #[test]
    fn test_shared_instance_is_stable() {
        assert!(std::ptr::eq(capabilities(), capabilities()));
        assert_eq!(*capabilities(), CapabilitySet::build());
    }

    #[test]
    fn test_serializes_as_builtin_list() {
        let json = serde_json::to_value(capabilities()).unwrap();
        let names = json["builtins"].as_array().unwrap();
        assert!(names.iter().all(|n| n != "http.send"));
    }
}
