//! Structural diff between two facet trees.
//!
//! [`plan`] walks the old and new tree side by side against the table
//! schema and emits the minimal list of row writes that turns the stored
//! old tree into the new one. Children are written before their parent, and
//! a row whose scalar values did not change is not written at all.

use super::schema::{Child, Table};
use super::tree::Tree;
use serde_json::Value;

pub(crate) type Row = Vec<(&'static str, Value)>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    /// Insert or replace the row identified by the table's key columns.
    Upsert { table: &'static Table, values: Row },
    Delete { table: &'static Table, keys: Row },
}

impl Op {
    pub(crate) fn table(&self) -> &'static Table {
        match self {
            Self::Upsert { table, .. } | Self::Delete { table, .. } => table,
        }
    }
}

/// Scalar values of a row, in column order. Absent columns are null.
fn primitives(table: &'static Table, row: &Tree) -> Row {
    table.columns.iter().map(|(name, _)| (*name, row.get(*name).cloned().unwrap_or(Value::Null))).collect()
}

fn keys(table: &'static Table, row: &Tree) -> Row {
    table.key.iter().map(|name| (*name, row.get(*name).cloned().unwrap_or(Value::Null))).collect()
}

/// Diff one row (and everything below it).
pub(crate) fn plan(table: &'static Table, old: Option<&Tree>, new: Option<&Tree>, ops: &mut Vec<Op>) {
    let Some(new) = new else {
        if let Some(old) = old {
            delete(table, old, ops);
        }
        return;
    };
    for (key, child) in table.children {
        let old_value = old.and_then(|old| old.get(*key));
        let new_value = new.get(*key);
        match child {
            Child::One(child) => plan(child, old_value.and_then(Value::as_object), new_value.and_then(Value::as_object), ops),
            Child::Many(child) => plan_list(child, entries(old_value), entries(new_value), ops),
        }
    }
    let values = primitives(table, new);
    match old {
        Some(old) if primitives(table, old) == values => {},
        Some(old) => {
            let old_keys = keys(table, old);
            if old_keys != keys(table, new) {
                ops.push(Op::Delete { table, keys: old_keys });
            }
            ops.push(Op::Upsert { table, values });
        },
        None => ops.push(Op::Upsert { table, values }),
    }
}

fn entries(value: Option<&Value>) -> Vec<&Tree> {
    value.and_then(Value::as_array).map(|list| list.iter().filter_map(Value::as_object).collect()).unwrap_or_default()
}

/// List entries are matched by their key columns, never by position.
fn plan_list(table: &'static Table, old: Vec<&Tree>, new: Vec<&Tree>, ops: &mut Vec<Op>) {
    let new_keys: Vec<Row> = new.iter().map(|entry| keys(table, entry)).collect();
    for entry in &old {
        if !new_keys.contains(&keys(table, entry)) {
            delete(table, entry, ops);
        }
    }
    for (entry, entry_keys) in new.iter().zip(&new_keys) {
        let matched = old.iter().find(|old| keys(table, old) == *entry_keys).copied();
        plan(table, matched, Some(*entry), ops);
    }
}

fn delete(table: &'static Table, old: &Tree, ops: &mut Vec<Op>) {
    for (key, child) in table.children {
        match child {
            Child::One(child) => {
                if let Some(nested) = old.get(*key).and_then(Value::as_object) {
                    delete(child, nested, ops);
                }
            },
            Child::Many(child) => {
                for entry in entries(old.get(*key)) {
                    delete(child, entry, ops);
                }
            },
        }
    }
    ops.push(Op::Delete { table, keys: keys(table, old) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::schema::ROOT;
    use serde_json::json;

    fn tree(value: Value) -> Tree {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn image(files: &[&str]) -> Tree {
        let gallery: Vec<Value> = files.iter().map(|file| json!({"path": "d", "file": file, "title": null})).collect();
        tree(json!({
            "path": "d",
            "facet_types": 33,
            "generic": {"path": "d"},
            "image": {"path": "d", "gallery": gallery},
        }))
    }

    fn summary(ops: &[Op]) -> Vec<String> {
        ops.iter()
            .map(|op| match op {
                Op::Upsert { table, values } => format!("upsert {} {}", table.name, values[values.len().min(2) - 1].1),
                Op::Delete { table, keys } => format!("delete {} {}", table.name, keys[keys.len() - 1].1),
            })
            .collect()
    }

    #[test]
    fn test_identical_trees_need_no_writes() {
        let tree = image(&["a.jpg", "b.jpg"]);
        let mut ops = Vec::new();
        plan(&ROOT, Some(&tree), Some(&tree), &mut ops);
        assert!(ops.is_empty(), "{ops:?}");
    }

    #[test]
    fn test_insert_writes_children_first() {
        let mut ops = Vec::new();
        plan(&ROOT, None, Some(&image(&["a.jpg"])), &mut ops);
        assert_eq!(
            summary(&ops),
            [r#"upsert generic "d""#, r#"upsert gallery "a.jpg""#, r#"upsert image "d""#, "upsert facets 33"]
        );
    }

    #[test]
    fn test_list_entries_match_by_file() {
        let mut ops = Vec::new();
        plan(&ROOT, Some(&image(&["a.jpg", "b.jpg"])), Some(&image(&["b.jpg", "c.jpg"])), &mut ops);
        assert_eq!(summary(&ops), [r#"delete gallery "a.jpg""#, r#"upsert gallery "c.jpg""#]);
    }

    #[test]
    fn test_changed_scalar_rewrites_only_its_row() {
        let old = image(&["a.jpg"]);
        let mut new = old.clone();
        new["image"]["gallery"][0]["title"] = json!("Sunset");
        let mut ops = Vec::new();
        plan(&ROOT, Some(&old), Some(&new), &mut ops);
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], Op::Upsert { table, values } if table.name == "gallery" && values[2] == ("title", json!("Sunset"))));
    }

    #[test]
    fn test_removed_kind_cascades() {
        let old = image(&["a.jpg", "b.jpg"]);
        let new = tree(json!({"path": "d", "facet_types": 1, "generic": {"path": "d"}}));
        let mut ops = Vec::new();
        plan(&ROOT, Some(&old), Some(&new), &mut ops);
        assert_eq!(
            summary(&ops),
            [r#"delete gallery "a.jpg""#, r#"delete gallery "b.jpg""#, r#"delete image "d""#, "upsert facets 1"]
        );
    }

    #[test]
    fn test_removed_tree_deletes_every_row() {
        let mut ops = Vec::new();
        plan(&ROOT, Some(&image(&["a.jpg"])), None, &mut ops);
        assert_eq!(ops.iter().filter(|op| matches!(op, Op::Delete { .. })).count(), 4);
        assert_eq!(ops.last().map(|op| op.table().name), Some("facets"));
    }
}
