use lazy_static::lazy_static;
use serde_json::Value;

use crate::{
    env::Environment,
    errors::JSONPathError,
    node::{NodeList, PathSegment},
    query::Query,
};

lazy_static! {
    /// The standard function extensions, shared by every convenience entry point.
    pub static ref ENV: Environment = Environment::standard();
}

/// Parse `expr` and evaluate it against `value` with the standard functions.
pub fn find<'v>(expr: &str, value: &'v Value) -> Result<NodeList<'v>, JSONPathError> {
    let query = Query::standard(expr)?;
    Ok(query.find(value, &ENV))
}

fn get_mut<'a>(value: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    path.iter().try_fold(value, |v, segment| match segment {
        PathSegment::Index(i) => v.as_array_mut()?.get_mut(*i),
        PathSegment::Name(name) => v.as_object_mut()?.get_mut(name),
    })
}

/// Replace the value at each of `paths` with the result of `f`, returning
/// how many values were replaced. Paths that no longer exist are skipped.
pub fn replace<F>(value: &mut Value, paths: &[Vec<PathSegment>], mut f: F) -> usize
where
    F: FnMut(&Value) -> Value,
{
    let mut count = 0;

    for path in paths {
        if let Some(target) = get_mut(value, path) {
            *target = f(target);
            count += 1;
        } else {
            log::debug!("nothing to replace at {}", crate::node::normalized_path(path));
        }
    }

    count
}

/// Remove the value at each of `paths` from its parent, returning how many
/// values were removed.
///
/// Array elements are removed from the highest index down, so removing
/// several elements of one array in one pass removes exactly the elements
/// the paths named when they were selected. The root can't be removed.
pub fn remove(value: &mut Value, paths: &[Vec<PathSegment>]) -> usize {
    let mut paths: Vec<&Vec<PathSegment>> = paths.iter().collect();
    paths.sort_unstable_by(|a, b| b.cmp(a));
    paths.dedup();

    let mut count = 0;

    for path in paths {
        let Some((last, parent)) = path.split_last() else {
            log::debug!("can't remove the root value");
            continue;
        };

        let removed = match (get_mut(value, parent), last) {
            (Some(Value::Array(items)), PathSegment::Index(i)) if *i < items.len() => {
                items.remove(*i);
                true
            }
            (Some(Value::Object(map)), PathSegment::Name(name)) => {
                map.shift_remove(name).is_some()
            }
            _ => false,
        };

        if removed {
            count += 1;
        }
    }

    count
}
