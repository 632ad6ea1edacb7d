use anyhow::Result;
use serde_json::Value;

use crate::error::{Error, ErrorKind};

/// One step of a JSON path: a field lookup, an array index, or both (field first).
///
/// An empty `path` skips the field lookup and a negative `index` skips the array lookup.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub path: String,
    #[serde(default = "no_index")]
    pub index: i64,
}

fn no_index() -> i64 {
    -1
}

impl PathItem {
    pub fn field(name: &str) -> Self {
        Self {
            path: String::from(name),
            index: -1,
        }
    }

    pub fn item(index: usize) -> Self {
        Self {
            path: String::new(),
            index: index as i64,
        }
    }

    pub fn field_item(name: &str, index: usize) -> Self {
        Self {
            path: String::from(name),
            index: index as i64,
        }
    }

    /// Parses `"meshes/0/name"` style paths; numeric segments become array steps.
    pub fn parse_path(path: &str) -> Vec<PathItem> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.parse::<usize>() {
                Ok(index) => PathItem::item(index),
                Err(_) => PathItem::field(segment),
            })
            .collect()
    }
}

pub fn get_from_path<'a>(root: &'a Value, steps: &[PathItem]) -> Option<&'a Value> {
    let mut current = root;
    for step in steps {
        if !step.path.is_empty() {
            current = current.as_object()?.get(&step.path)?;
        }
        if step.index >= 0 {
            current = current.as_array()?.get(step.index as usize)?;
        }
    }
    Some(current)
}

pub fn get_string_from_path<'a>(root: &'a Value, steps: &[PathItem]) -> Option<&'a str> {
    get_from_path(root, steps)?.as_str()
}

pub fn get_number_from_path(root: &Value, steps: &[PathItem]) -> Option<f64> {
    get_from_path(root, steps)?.as_f64()
}

pub fn get_bool_from_path(root: &Value, steps: &[PathItem]) -> Option<bool> {
    get_from_path(root, steps)?.as_bool()
}

/// Length of the array at `steps`, or `None` when the value is not an array.
pub fn get_array_size_from_path(root: &Value, steps: &[PathItem]) -> Option<usize> {
    Some(get_from_path(root, steps)?.as_array()?.len())
}

pub fn get_object_keys_from_path(root: &Value, steps: &[PathItem]) -> Option<Vec<String>> {
    Some(get_from_path(root, steps)?.as_object()?.keys().cloned().collect())
}

/// Fetches `root[collection][index]`, failing with `IndexOutOfRange` when absent.
pub fn root_item<'a>(root: &'a Value, collection: &str, index: usize) -> Result<&'a Value> {
    match root
        .get(collection)
        .and_then(Value::as_array)
        .and_then(|items| items.get(index))
    {
        Some(item) => Ok(item),
        None => Err(Error::new(
            ErrorKind::IndexOutOfRange,
            format!("The given {collection} index is invalid: {index}"),
        )
        .into()),
    }
}

pub fn root_len(root: &Value, collection: &str) -> usize {
    root.get(collection)
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Fetches `root.extensions[extension][collection][index]`.
pub fn root_extension_item<'a>(
    root: &'a Value,
    extension: &str,
    collection: &str,
    index: usize,
) -> Option<&'a Value> {
    root.get_extension(extension)?
        .get(collection)?
        .as_array()?
        .get(index)
}

/// Typed read helpers over glTF objects; absent or mistyped keys read as `None`.
pub trait JsonValueExt {
    fn get_index(&self, key: &str) -> Option<usize>;
    fn get_number(&self, key: &str) -> Option<f64>;
    fn get_string(&self, key: &str) -> Option<&str>;
    fn get_array(&self, key: &str) -> Option<&Vec<Value>>;
    fn get_f32_array<const N: usize>(&self, key: &str) -> Option<[f32; N]>;
    fn get_f32_vec(&self, key: &str) -> Option<Vec<f32>>;
    fn get_extension(&self, name: &str) -> Option<&Value>;
    fn get_extras(&self) -> Option<&Value>;

    fn get_f32_or(&self, key: &str, default: f32) -> f32 {
        self.get_number(key).map_or(default, |value| value as f32)
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool;

    /// Non-negative integers of an array, silently skipping anything else.
    fn get_indices(&self, key: &str) -> Vec<usize> {
        self.get_array(key).map_or_else(Vec::new, |items| {
            items
                .iter()
                .filter_map(|item| item.as_u64().map(|index| index as usize))
                .collect()
        })
    }

    fn get_name(&self) -> Option<&str> {
        self.get_string("name")
    }
}

impl JsonValueExt for Value {
    fn get_index(&self, key: &str) -> Option<usize> {
        self.get(key)?.as_u64().map(|index| index as usize)
    }

    fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key)?.as_array()
    }

    fn get_f32_array<const N: usize>(&self, key: &str) -> Option<[f32; N]> {
        let items = self.get_array(key)?;
        if items.len() != N {
            return None;
        }

        let mut values = [0.0; N];
        for (value, item) in values.iter_mut().zip(items) {
            *value = item.as_f64()? as f32;
        }
        Some(values)
    }

    fn get_f32_vec(&self, key: &str) -> Option<Vec<f32>> {
        self.get_array(key)?
            .iter()
            .map(|item| item.as_f64().map(|value| value as f32))
            .collect()
    }

    fn get_extension(&self, name: &str) -> Option<&Value> {
        self.get("extensions")?.get(name)
    }

    fn get_extras(&self) -> Option<&Value> {
        self.get("extras")
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "asset": {"version": "2.0", "generator": "test"},
            "nodes": [
                {"name": "root", "children": [1, 2], "extras": {"weight": 0.5}},
                {"name": "child", "translation": [1.0, 2.0, 3.0]},
                {"name": "leaf", "visible": false}
            ],
            "extensions": {
                "KHR_lights_punctual": {"lights": [{"type": "point"}]}
            }
        })
    }

    fn collect_paths(value: &Value, prefix: Vec<PathItem>, out: &mut Vec<(Vec<PathItem>, Value)>) {
        out.push((prefix.clone(), value.clone()));
        match value {
            Value::Object(fields) => {
                for (key, field) in fields {
                    let mut steps = prefix.clone();
                    steps.push(PathItem::field(key));
                    collect_paths(field, steps, out);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let mut steps = prefix.clone();
                    steps.push(PathItem::item(index));
                    collect_paths(item, steps, out);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn every_reachable_value_round_trips() {
        let root = document();
        let mut paths = vec![];
        collect_paths(&root, vec![], &mut paths);

        assert!(paths.len() > 10);
        for (steps, value) in paths {
            assert_eq!(get_from_path(&root, &steps), Some(&value));
        }
    }

    #[test]
    fn typed_path_getters() {
        let root = document();

        assert_eq!(
            get_string_from_path(&root, &[PathItem::field_item("nodes", 1), PathItem::field("name")]),
            Some("child")
        );
        assert_eq!(
            get_number_from_path(&root, &PathItem::parse_path("nodes/1/translation/2")),
            Some(3.0)
        );
        assert_eq!(
            get_bool_from_path(&root, &PathItem::parse_path("nodes/2/visible")),
            Some(false)
        );
        assert_eq!(get_array_size_from_path(&root, &PathItem::parse_path("nodes")), Some(3));
        assert_eq!(
            get_object_keys_from_path(&root, &PathItem::parse_path("asset")),
            Some(vec![String::from("generator"), String::from("version")])
        );
        assert_eq!(get_from_path(&root, &PathItem::parse_path("nodes/9")), None);
    }

    #[test]
    fn path_items_deserialize_with_defaults() {
        let steps: Vec<PathItem> =
            serde_json::from_str(r#"[{"path": "nodes"}, {"index": 0}, {"path": "name"}]"#).unwrap();
        assert_eq!(get_string_from_path(&document(), &steps), Some("root"));
    }

    #[test]
    fn value_helpers() {
        let root = document();
        let node = root_item(&root, "nodes", 1).unwrap();

        assert_eq!(node.get_f32_array::<3>("translation"), Some([1.0, 2.0, 3.0]));
        assert_eq!(node.get_f32_array::<4>("translation"), None);
        assert_eq!(node.get_name(), Some("child"));
        assert_eq!(root_item(&root, "nodes", 0).unwrap().get_indices("children"), vec![1, 2]);
        assert_eq!(root_len(&root, "nodes"), 3);
        assert_eq!(root_len(&root, "meshes"), 0);
        assert!(root_extension_item(&root, "KHR_lights_punctual", "lights", 0).is_some());
        assert!(root_extension_item(&root, "KHR_lights_punctual", "lights", 1).is_none());

        let error = root_item(&root, "nodes", 3).unwrap_err();
        assert_eq!(crate::error::kind_of(&error), Some(ErrorKind::IndexOutOfRange));
    }
}
