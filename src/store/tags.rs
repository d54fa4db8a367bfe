//! Tag reconciliation - diffing a store's linked tags against a target set

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

/// The link changes needed to move a store's tag set to a target set.
#[derive(Debug, Default, PartialEq)]
pub struct TagDiff {
    /// Join-row ids to delete
    pub to_remove: Vec<Uuid>,
    /// Tag names to link, created in the dictionary first when absent
    pub to_add: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Compute the link changes from `current` (tag name to join-row id) to
/// `target`.
///
/// Pure set arithmetic: duplicate target names collapse and input order is
/// irrelevant. An empty current map (store creation) reduces to "add every
/// target name"; an empty target removes every link. Names compare
/// case-sensitively.
pub fn diff_tags(current: &BTreeMap<String, Uuid>, target: &[String]) -> TagDiff {
    let target_names: BTreeSet<&str> = target.iter().map(String::as_str).collect();

    let to_remove = current
        .iter()
        .filter(|(name, _)| !target_names.contains(name.as_str()))
        .map(|(_, link_id)| *link_id)
        .collect();

    let to_add = target_names
        .into_iter()
        .filter(|name| !current.contains_key(*name))
        .map(str::to_owned)
        .collect();

    TagDiff { to_remove, to_add }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(entries: &[(&str, Uuid)]) -> BTreeMap<String, Uuid> {
        entries
            .iter()
            .map(|(name, id)| (name.to_string(), *id))
            .collect()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn creation_adds_every_target_name() {
        let diff = diff_tags(&BTreeMap::new(), &names(&["タグ1", "タグ2", "タグ3"]));

        assert!(diff.to_remove.is_empty());
        assert_eq!(diff.to_add, names(&["タグ1", "タグ2", "タグ3"]));
    }

    #[test]
    fn duplicate_target_names_collapse() {
        let diff = diff_tags(&BTreeMap::new(), &names(&["a", "a", "b"]));

        assert_eq!(diff.to_add, names(&["a", "b"]));
    }

    #[test]
    fn empty_target_on_creation_yields_empty_diff() {
        let diff = diff_tags(&BTreeMap::new(), &[]);

        assert!(diff.is_empty());
    }

    #[test]
    fn moving_from_ab_to_bc_removes_a_and_adds_c() {
        let link_a = Uuid::new_v4();
        let link_b = Uuid::new_v4();
        let current = current(&[("A", link_a), ("B", link_b)]);

        let diff = diff_tags(&current, &names(&["B", "C"]));

        // A's link goes, C is new, B is untouched
        assert_eq!(diff.to_remove, vec![link_a]);
        assert_eq!(diff.to_add, names(&["C"]));
    }

    #[test]
    fn identical_sets_change_nothing() {
        let current = current(&[("A", Uuid::new_v4()), ("B", Uuid::new_v4())]);

        let diff = diff_tags(&current, &names(&["B", "A"]));

        assert!(diff.is_empty());
    }

    #[test]
    fn empty_target_removes_every_link() {
        let link_a = Uuid::new_v4();
        let link_b = Uuid::new_v4();
        let current = current(&[("A", link_a), ("B", link_b)]);

        let mut diff = diff_tags(&current, &[]);
        diff.to_remove.sort();

        let mut expected = vec![link_a, link_b];
        expected.sort();
        assert_eq!(diff.to_remove, expected);
        assert!(diff.to_add.is_empty());
    }

    #[test]
    fn names_compare_case_sensitively() {
        let link = Uuid::new_v4();
        let current = current(&[("Cafe", link)]);

        let diff = diff_tags(&current, &names(&["cafe"]));

        assert_eq!(diff.to_remove, vec![link]);
        assert_eq!(diff.to_add, names(&["cafe"]));
    }
}
