//! Uniqueness constraint classification.
//!
//! Decides, per table, which uniqueness constraints are satisfied by
//! combination building (one overlapping group plus any standalone
//! composites), which by single-column allocation, and which cannot be
//! enforced and only get a data-quality warning.

use std::collections::{BTreeSet, HashSet};

/// A uniqueness rule as seen by the classifier. Primary keys are included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub is_primary: bool,
    /// Declaration position, used to keep every ordering deterministic.
    pub order: usize,
}

impl UniqueSpec {
    fn column_set(&self) -> BTreeSet<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

/// Column facts the classifier needs.
#[derive(Debug, Default)]
pub struct ColumnFacts {
    /// Columns with a usable value source: populate config, enum labels, or
    /// non-conditional FK parent values.
    pub controlled: HashSet<String>,
    /// Non-conditional FK columns (physical, logical, or static).
    pub foreign: HashSet<String>,
    /// Column sets of composite FKs; their columns are drawn as one tuple.
    pub tuple_groups: Vec<Vec<String>>,
    /// Database-assigned columns.
    pub auto_generated: HashSet<String>,
}

impl ColumnFacts {
    fn is_controlled(&self, column: &str) -> bool {
        self.controlled.contains(column)
    }

    fn tuple_group_of(&self, column: &str) -> Option<&Vec<String>> {
        self.tuple_groups
            .iter()
            .find(|group| group.iter().any(|candidate| candidate == column))
    }
}

/// Overlapping constraints merged by transitive closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintGroup {
    pub members: Vec<UniqueSpec>,
    /// Columns present in every member, in first-member order.
    pub shared: Vec<String>,
    /// Union of the members' columns minus `shared`, in declaration order.
    pub non_shared: Vec<String>,
}

impl ConstraintGroup {
    fn new(mut members: Vec<UniqueSpec>) -> Self {
        members.sort_by_key(|member| member.order);
        let sets: Vec<BTreeSet<&str>> = members.iter().map(UniqueSpec::column_set).collect();
        let shared: Vec<String> = members
            .first()
            .map(|first| {
                first
                    .columns
                    .iter()
                    .filter(|column| sets.iter().all(|set| set.contains(column.as_str())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let mut non_shared = Vec::new();
        for member in &members {
            for column in &member.columns {
                if !shared.contains(column) && !non_shared.contains(column) {
                    non_shared.push(column.clone());
                }
            }
        }
        Self {
            members,
            shared,
            non_shared,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.shared.iter().chain(self.non_shared.iter())
    }

    pub fn label(&self) -> String {
        self.members
            .iter()
            .map(|member| member.name.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Handling chosen for a standalone composite constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    /// Every column is a foreign key.
    AllForeign,
    /// Foreign keys mixed with controlled plain columns (or controlled
    /// plain columns only).
    Mixed,
}

/// Outcome of classifying one table.
#[derive(Debug, Default)]
pub struct Classification {
    pub group: Option<ConstraintGroup>,
    pub composites: Vec<(UniqueSpec, CompositeKind)>,
    pub singles: Vec<UniqueSpec>,
    /// Constraints no strategy can enforce; duplicates are possible.
    pub unresolved: Vec<UniqueSpec>,
    /// Overlapping groups past the first; reported, not resolved.
    pub extra_groups: Vec<ConstraintGroup>,
    /// Constraints implied by a narrower one, as `(pruned, implied_by)`.
    pub pruned: Vec<(UniqueSpec, String)>,
    /// Constraints containing a database-assigned column.
    pub database_assigned: Vec<UniqueSpec>,
}

/// Classify uniqueness constraints in precedence order: one overlapping
/// group, then standalone composites, then single columns.
pub fn classify(specs: Vec<UniqueSpec>, facts: &ColumnFacts) -> Classification {
    let mut out = Classification::default();

    let mut candidates: Vec<UniqueSpec> = Vec::new();
    let mut seen_sets: HashSet<BTreeSet<String>> = HashSet::new();
    let mut specs = specs;
    specs.sort_by_key(|spec| (!spec.is_primary, spec.order));
    for spec in specs {
        if spec
            .columns
            .iter()
            .any(|column| facts.auto_generated.contains(column))
        {
            out.database_assigned.push(spec);
            continue;
        }
        let set: BTreeSet<String> = spec.columns.iter().cloned().collect();
        if seen_sets.insert(set) {
            candidates.push(spec);
        }
    }
    candidates.sort_by_key(|spec| spec.order);

    let mut kept: Vec<UniqueSpec> = Vec::new();
    for spec in &candidates {
        let set = spec.column_set();
        let narrower = candidates.iter().find(|other| {
            let other_set = other.column_set();
            other_set.len() < set.len() && other_set.is_subset(&set)
        });
        match narrower {
            Some(other) => out.pruned.push((spec.clone(), other.name.clone())),
            None => kept.push(spec.clone()),
        }
    }

    let components = overlap_components(&kept);
    let mut grouped: HashSet<usize> = HashSet::new();
    for component in components.into_iter().filter(|component| component.len() > 1) {
        grouped.extend(component.iter().copied());
        let group = ConstraintGroup::new(component.iter().map(|idx| kept[*idx].clone()).collect());
        if out.group.is_none() && out.extra_groups.is_empty() {
            if group_is_resolvable(&group, facts) {
                out.group = Some(group);
            } else {
                out.unresolved.extend(group.members.iter().cloned());
                out.extra_groups.push(group);
            }
        } else {
            out.extra_groups.push(group);
        }
    }

    for (idx, spec) in kept.into_iter().enumerate() {
        if grouped.contains(&idx) {
            continue;
        }
        if spec.columns.len() == 1 {
            if facts.tuple_group_of(&spec.columns[0]).is_some() {
                out.unresolved.push(spec);
            } else {
                out.singles.push(spec);
            }
            continue;
        }
        if composite_is_resolvable(&spec, facts) {
            let kind = if spec
                .columns
                .iter()
                .all(|column| facts.foreign.contains(column))
            {
                CompositeKind::AllForeign
            } else {
                CompositeKind::Mixed
            };
            out.composites.push((spec, kind));
        } else {
            out.unresolved.push(spec);
        }
    }

    out
}

/// Connected components of constraints linked by a shared column, each in
/// declaration order, ordered by their first member.
fn overlap_components(specs: &[UniqueSpec]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..specs.len()).collect();

    fn find(parent: &mut [usize], idx: usize) -> usize {
        let mut root = idx;
        while parent[root] != root {
            root = parent[root];
        }
        let mut node = idx;
        while parent[node] != root {
            let next = parent[node];
            parent[node] = root;
            node = next;
        }
        root
    }

    for left in 0..specs.len() {
        for right in (left + 1)..specs.len() {
            let left_set = specs[left].column_set();
            if specs[right]
                .columns
                .iter()
                .any(|column| left_set.contains(column.as_str()))
            {
                let (a, b) = (find(&mut parent, left), find(&mut parent, right));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    for idx in 0..specs.len() {
        let root = find(&mut parent, idx);
        match roots.iter().position(|candidate| *candidate == root) {
            Some(pos) => components[pos].push(idx),
            None => {
                roots.push(root);
                components.push(vec![idx]);
            }
        }
    }
    components
}

fn composite_is_resolvable(spec: &UniqueSpec, facts: &ColumnFacts) -> bool {
    let set = spec.column_set();
    spec.columns.iter().all(|column| {
        facts.is_controlled(column)
            && facts
                .tuple_group_of(column)
                .is_none_or(|group| group.iter().all(|member| set.contains(member.as_str())))
    })
}

fn group_is_resolvable(group: &ConstraintGroup, facts: &ColumnFacts) -> bool {
    if !group.columns().all(|column| facts.is_controlled(column)) {
        return false;
    }
    let shared: BTreeSet<&str> = group.shared.iter().map(String::as_str).collect();
    let columns: BTreeSet<&str> = group.columns().map(String::as_str).collect();
    facts.tuple_groups.iter().all(|tuple| {
        let inside = tuple.iter().filter(|c| columns.contains(c.as_str())).count();
        if inside == 0 {
            return true;
        }
        if inside != tuple.len() {
            return false;
        }
        let in_shared = tuple.iter().filter(|c| shared.contains(c.as_str())).count();
        if in_shared == tuple.len() {
            return true;
        }
        in_shared == 0
            && group.members.iter().all(|member| {
                let set = member.column_set();
                let covered = tuple.iter().filter(|c| set.contains(c.as_str())).count();
                covered == 0 || covered == tuple.len()
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(name: &str, columns: &[&str], order: usize) -> UniqueSpec {
        UniqueSpec {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            is_primary: false,
            order,
        }
    }

    fn facts(controlled: &[&str], foreign: &[&str]) -> ColumnFacts {
        ColumnFacts {
            controlled: controlled.iter().map(|c| c.to_string()).collect(),
            foreign: foreign.iter().map(|c| c.to_string()).collect(),
            ..ColumnFacts::default()
        }
    }

    #[test]
    fn overlapping_constraints_form_one_group() {
        let specs = vec![
            unique("uq_a_c", &["a_id", "c_id"], 0),
            unique("uq_a_pr", &["a_id", "pr"], 1),
        ];
        let out = classify(specs, &facts(&["a_id", "c_id", "pr"], &["a_id", "c_id"]));

        let group = out.group.expect("group");
        assert_eq!(group.shared, vec!["a_id".to_string()]);
        assert_eq!(group.non_shared, vec!["c_id".to_string(), "pr".to_string()]);
        assert!(out.composites.is_empty());
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn grouping_is_independent_of_declaration_order() {
        let forward = classify(
            vec![
                unique("uq_ab", &["a", "b"], 0),
                unique("uq_bc", &["b", "c"], 1),
                unique("uq_xy", &["x", "y"], 2),
            ],
            &facts(&["a", "b", "c", "x", "y"], &[]),
        );
        let shuffled = classify(
            vec![
                unique("uq_xy", &["x", "y"], 2),
                unique("uq_bc", &["b", "c"], 1),
                unique("uq_ab", &["a", "b"], 0),
            ],
            &facts(&["a", "b", "c", "x", "y"], &[]),
        );
        assert_eq!(forward.group, shuffled.group);
        assert_eq!(forward.group.expect("group").label(), "uq_ab+uq_bc");
    }

    #[test]
    fn second_overlap_group_is_reported_not_resolved() {
        let out = classify(
            vec![
                unique("uq_ab", &["a", "b"], 0),
                unique("uq_ac", &["a", "c"], 1),
                unique("uq_xy", &["x", "y"], 2),
                unique("uq_xz", &["x", "z"], 3),
            ],
            &facts(&["a", "b", "c", "x", "y", "z"], &[]),
        );
        assert!(out.group.is_some());
        assert_eq!(out.extra_groups.len(), 1);
        assert_eq!(out.extra_groups[0].label(), "uq_xy+uq_xz");
    }

    #[test]
    fn composites_split_by_foreign_key_share() {
        let out = classify(
            vec![
                unique("uq_fk", &["user_id", "product_id"], 0),
                unique("uq_mixed", &["store_id", "slot"], 1),
                unique("uq_loose", &["label", "kind"], 2),
            ],
            &facts(
                &["user_id", "product_id", "store_id", "slot", "kind"],
                &["user_id", "product_id", "store_id"],
            ),
        );
        assert_eq!(out.composites.len(), 2);
        assert_eq!(out.composites[0].1, CompositeKind::AllForeign);
        assert_eq!(out.composites[1].1, CompositeKind::Mixed);
        assert_eq!(out.unresolved.len(), 1);
        assert_eq!(out.unresolved[0].name, "uq_loose");
    }

    #[test]
    fn superset_constraints_are_pruned_and_pk_dedupes() {
        let mut pk = unique("pk", &["code"], 5);
        pk.is_primary = true;
        let out = classify(
            vec![
                unique("uq_code", &["code"], 0),
                unique("uq_code_kind", &["code", "kind"], 1),
                pk,
            ],
            &facts(&["code", "kind"], &[]),
        );
        assert_eq!(out.singles.len(), 1);
        assert_eq!(out.singles[0].name, "pk");
        assert_eq!(out.pruned.len(), 1);
        assert_eq!(out.pruned[0].1, "pk");
    }

    #[test]
    fn partial_composite_fk_disqualifies_combination() {
        let mut column_facts = facts(&["a", "b", "c"], &["a", "b"]);
        column_facts.tuple_groups = vec![vec!["a".to_string(), "b".to_string()]];

        let out = classify(vec![unique("uq_a_c", &["a", "c"], 0)], &column_facts);
        assert!(out.composites.is_empty());
        assert_eq!(out.unresolved.len(), 1);

        let out = classify(vec![unique("uq_ab_c", &["a", "b", "c"], 0)], &column_facts);
        assert_eq!(out.composites.len(), 1);
    }

    #[test]
    fn auto_generated_members_need_no_strategy() {
        let mut column_facts = facts(&[], &[]);
        column_facts.auto_generated.insert("id".to_string());
        let out = classify(vec![unique("pk", &["id"], 0)], &column_facts);
        assert_eq!(out.database_assigned.len(), 1);
        assert!(out.singles.is_empty());
    }
}
