//! Per-node parameter values, plus the concrete type chosen for every
//! parameter declared as `any`.
//!
//! Any-type entries are keyed `"{node}${param}"`. An entry exists exactly
//! when the parameter's declared type is `any`.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::catalog::NodeStructure;
use crate::error::EditorError;
use crate::param_type::ParamKind;

pub const DEFAULT_ANY_TYPE: &str = "str";
const ANY_KEY_SEPARATOR: char = '$';

pub type NodeConfig = BTreeMap<String, Value>;

pub fn any_key(node: &str, param: &str) -> String {
    format!("{node}{ANY_KEY_SEPARATOR}{param}")
}

/// The parameter part of `key` when it is an any-type key of `node`.
pub fn any_key_param<'a>(key: &'a str, node: &str) -> Option<&'a str> {
    key.strip_prefix(node)?.strip_prefix(ANY_KEY_SEPARATOR)
}

/// Node names are non-empty and never contain the any-key separator.
pub fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(ANY_KEY_SEPARATOR)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    configs: BTreeMap<String, NodeConfig>,
    any_configs: BTreeMap<String, String>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills in one entry per declared parameter using the catalog defaults.
    pub fn init_node(&mut self, name: &str, structure: &NodeStructure) {
        let mut config = NodeConfig::new();
        for param in &structure.parameter {
            let kind = ParamKind::classify(&param.param_type);
            config.insert(param.name.clone(), kind.initial_value(&param.default_value));
            if kind.is_any() {
                self.any_configs
                    .insert(any_key(name, &param.name), DEFAULT_ANY_TYPE.to_string());
            }
        }
        self.configs.insert(name.to_string(), config);
    }

    /// Copies `from`'s values to `to` and carries over the concrete type of
    /// every any-typed parameter declared on `structure`.
    ///
    /// Returns `false` without touching anything when `from` has no config.
    pub fn clone_config(&mut self, from: &str, structure: &NodeStructure, to: &str) -> bool {
        let Some(config) = self.configs.get(from).cloned() else {
            debug!(from, to, "no parameter config to clone");
            return false;
        };
        self.configs.insert(to.to_string(), config);

        for param in &structure.parameter {
            if !ParamKind::classify(&param.param_type).is_any() {
                continue;
            }
            let selected = self
                .any_configs
                .get(&any_key(from, &param.name))
                .cloned()
                .unwrap_or_else(|| DEFAULT_ANY_TYPE.to_string());
            self.any_configs.insert(any_key(to, &param.name), selected);
        }
        true
    }

    pub fn remove_config(&mut self, name: &str) {
        self.configs.remove(name);
        self.any_configs
            .retain(|key, _| any_key_param(key, name).is_none());
    }

    pub fn set_value(&mut self, node: &str, param: &str, value: Value) -> Result<(), EditorError> {
        let config = self
            .configs
            .get_mut(node)
            .ok_or_else(|| EditorError::UnknownNode {
                name: node.to_string(),
            })?;
        config.insert(param.to_string(), value);
        Ok(())
    }

    pub fn set_any_type(
        &mut self,
        node: &str,
        param: &str,
        concrete_type: &str,
    ) -> Result<(), EditorError> {
        let entry = self
            .any_configs
            .get_mut(&any_key(node, param))
            .ok_or_else(|| EditorError::NotAnyParameter {
                node: node.to_string(),
                param: param.to_string(),
            })?;
        *entry = concrete_type.to_string();
        Ok(())
    }

    pub fn config(&self, node: &str) -> Option<&NodeConfig> {
        self.configs.get(node)
    }

    pub fn value(&self, node: &str, param: &str) -> Option<&Value> {
        self.configs.get(node)?.get(param)
    }

    pub fn any_type(&self, node: &str, param: &str) -> Option<&str> {
        self.any_configs
            .get(&any_key(node, param))
            .map(String::as_str)
    }

    pub fn configs(&self) -> impl Iterator<Item = (&String, &NodeConfig)> {
        self.configs.iter()
    }

    pub fn any_configs(&self) -> impl Iterator<Item = (&String, &String)> {
        self.any_configs.iter()
    }

    pub(crate) fn insert_config(&mut self, node: String, config: NodeConfig) {
        self.configs.insert(node, config);
    }

    pub(crate) fn insert_any_type(&mut self, key: String, concrete_type: String) {
        self.any_configs.insert(key, concrete_type);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.any_configs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeParameter;

    fn param(name: &str, param_type: &str, default_value: Value) -> NodeParameter {
        NodeParameter {
            name: name.to_string(),
            param_type: param_type.to_string(),
            is_mandatory: false,
            description: String::new(),
            default_value,
        }
    }

    fn structure() -> NodeStructure {
        serde_json::from_value::<NodeStructure>(serde_json::json!({
            "package": "pkg.Mixed",
            "clazz": "Mixed",
        }))
        .map(|mut s| {
            s.parameter = vec![
                param("nums", "int", serde_json::json!(100)),
                param("penalty", "{'l1', 'l2'}", serde_json::json!("l2")),
                param("value", "any", serde_json::json!("ignored")),
                param("shape", "tuple[int, int]", serde_json::json!([1, 2])),
                param("frame", "pandas.DataFrame", serde_json::json!("ignored")),
            ];
            s
        })
        .expect("structure should deserialize")
    }

    #[test]
    fn test_init_node_applies_defaults_by_kind() {
        let mut store = ParameterStore::new();
        store.init_node("Mixed1", &structure());

        assert_eq!(store.value("Mixed1", "nums"), Some(&serde_json::json!(100)));
        assert_eq!(store.value("Mixed1", "penalty"), Some(&serde_json::json!("l2")));
        assert_eq!(store.value("Mixed1", "value"), Some(&Value::Null));
        assert_eq!(store.value("Mixed1", "shape"), Some(&Value::Null));
        assert_eq!(store.value("Mixed1", "frame"), Some(&Value::Null));
        assert_eq!(store.any_type("Mixed1", "value"), Some(DEFAULT_ANY_TYPE));
        assert_eq!(store.any_configs().count(), 1);
    }

    #[test]
    fn test_clone_config_is_independent_deep_copy() {
        let mut store = ParameterStore::new();
        let structure = structure();
        store.init_node("Mixed1", &structure);
        store
            .set_value("Mixed1", "value", serde_json::json!([1, 2, 3]))
            .expect("set value");
        store
            .set_any_type("Mixed1", "value", "list")
            .expect("set any type");

        assert!(store.clone_config("Mixed1", &structure, "Mixed2"));
        assert_eq!(store.config("Mixed1"), store.config("Mixed2"));
        assert_eq!(store.any_type("Mixed2", "value"), Some("list"));

        store
            .set_value("Mixed2", "value", serde_json::json!([9]))
            .expect("set clone value");
        store
            .set_any_type("Mixed2", "value", "int")
            .expect("set clone any type");
        assert_eq!(
            store.value("Mixed1", "value"),
            Some(&serde_json::json!([1, 2, 3]))
        );
        assert_eq!(store.any_type("Mixed1", "value"), Some("list"));
    }

    #[test]
    fn test_clone_config_without_source_is_noop() {
        let mut store = ParameterStore::new();
        assert!(!store.clone_config("Ghost1", &structure(), "Ghost2"));
        assert!(store.config("Ghost2").is_none());
        assert_eq!(store.any_configs().count(), 0);
    }

    #[test]
    fn test_remove_config_drops_only_matching_any_entries() {
        let mut store = ParameterStore::new();
        let structure = structure();
        store.init_node("Mixed1", &structure);
        store.init_node("Mixed10", &structure);

        store.remove_config("Mixed1");

        assert!(store.config("Mixed1").is_none());
        assert!(store.any_type("Mixed1", "value").is_none());
        assert_eq!(store.any_type("Mixed10", "value"), Some(DEFAULT_ANY_TYPE));
    }

    #[test]
    fn test_set_any_type_rejects_non_any_parameter() {
        let mut store = ParameterStore::new();
        store.init_node("Mixed1", &structure());

        let err = store
            .set_any_type("Mixed1", "nums", "int")
            .expect_err("nums is not any-typed");
        assert!(matches!(err, EditorError::NotAnyParameter { .. }));

        let err = store
            .set_value("Missing1", "nums", serde_json::json!(1))
            .expect_err("unknown node should error");
        assert!(matches!(err, EditorError::UnknownNode { .. }));
    }

    #[test]
    fn test_any_key_param_matches_whole_node_name() {
        assert_eq!(any_key_param("Node1$p", "Node1"), Some("p"));
        assert_eq!(any_key_param("Node12$p", "Node1"), None);
        assert_eq!(any_key_param("Node1", "Node1"), None);
    }

    #[test]
    fn test_node_name_validation() {
        assert!(is_valid_node_name("Mixed1"));
        assert!(!is_valid_node_name(""));
        assert!(!is_valid_node_name("a$b"));
    }

    #[test]
    fn test_remove_config_keeps_nodes_sharing_a_prefix() {
        let mut store = ParameterStore::new();
        store.init_node("Mixed1", &structure());
        store.init_node("Mixed12", &structure());
        store
            .set_any_type("Mixed12", "value", "int")
            .expect("value is any-typed");

        store.remove_config("Mixed1");

        assert!(store.config("Mixed1").is_none());
        assert_eq!(store.any_type("Mixed1", "value"), None);
        assert_eq!(store.any_type("Mixed12", "value"), Some("int"));
        assert_eq!(store.any_configs().count(), 1);
    }
}
