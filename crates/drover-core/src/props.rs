//! String property maps attached to every world entity.

use std::collections::BTreeMap;

use drover_proto::pojo::PropsMap;

/// Property map of one entity.
///
/// Received descriptions always carry the complete map, so updates replace
/// the contents wholesale through [`Props::sync_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Props {
    map: BTreeMap<String, String>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: &PropsMap) -> Self {
        Self { map: map.clone() }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.map.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    /// Make this map equal to `other`: keys missing from `other` are removed,
    /// every other key takes `other`'s value.
    pub fn sync_from(&mut self, other: &PropsMap) {
        self.map.retain(|k, _| other.contains_key(k));
        for (k, v) in other {
            if self.map.get(k) != Some(v) {
                self.map.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn map(&self) -> &BTreeMap<String, String> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_from_replaces_wholesale() {
        let mut props = Props::new();
        props.set("keep", "old");
        props.set("drop", "x");

        let mut incoming = PropsMap::new();
        incoming.insert("keep".into(), "new".into());
        incoming.insert("add".into(), "y".into());
        props.sync_from(&incoming);

        assert_eq!(props.get("keep"), Some("new"));
        assert_eq!(props.get("add"), Some("y"));
        assert_eq!(props.get("drop"), None);
        assert_eq!(props.len(), 2);
    }
}
