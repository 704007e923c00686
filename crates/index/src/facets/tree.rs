//! Conversion between typed facets and the JSON trees the sync engine diffs.
//!
//! In tree form every row carries its own key columns: nested mappings and
//! list entries get the directory `path`, and the top level gets
//! `facet_types`.

use super::schema::{Child, ROOT, Table};
use crate::error::{ErrorKind, Result};
use curator_facets::Facets;
use exn::ResultExt;
use serde_json::{Map, Value};

pub(crate) type Tree = Map<String, Value>;

pub(crate) fn to_tree(facets: &Facets) -> Result<Tree> {
    let Value::Object(mut tree) = serde_json::to_value(facets).or_raise(|| ErrorKind::InvalidData("facets"))? else {
        exn::bail!(ErrorKind::InvalidData("facets"));
    };
    tree.insert("facet_types".to_string(), Value::from(facets.facet_types().stored()));
    fill_path(&ROOT, &mut tree, &facets.path);
    Ok(tree)
}

fn fill_path(table: &Table, row: &mut Tree, path: &str) {
    row.insert("path".to_string(), Value::from(path));
    for (key, child) in table.children {
        match (child, row.get_mut(*key)) {
            (Child::One(child), Some(Value::Object(nested))) => fill_path(child, nested, path),
            (Child::Many(child), Some(Value::Array(entries))) => {
                for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
                    fill_path(child, entry, path);
                }
            },
            _ => {},
        }
    }
}

pub(crate) fn from_tree(tree: Tree) -> Result<Facets> {
    serde_json::from_value(Value::Object(tree)).or_raise(|| ErrorKind::InvalidData("facets"))
}
