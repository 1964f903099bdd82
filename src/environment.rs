use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
    #[error("{0}: readonly variable")]
    ReadOnly(String),
    #[error("{0}: not an array")]
    NotAnArray(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variable {
    pub name: String,
    pub value: String,
    pub exported: bool,
    pub readonly: bool,
    pub array: Option<Vec<String>>,
}

impl Variable {
    fn new(name: &str) -> Self {
        Variable {
            name: name.to_string(),
            ..Variable::default()
        }
    }
}

/// The shell's variable store.
///
/// The root store (`Environment::new`) mirrors every exported variable into the
/// process environment. That mirroring happens here and nowhere else, under the
/// store's write lock. Scoped copies made with [`Environment::snapshot`] never
/// touch the process environment; their exported values reach children through
/// [`Environment::exported_vars`].
#[derive(Debug)]
pub struct Environment {
    vars: RwLock<HashMap<String, Variable>>,
    sync_process_env: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Root store, seeded from the process environment with everything exported.
    pub fn new() -> Self {
        let vars = std::env::vars()
            .map(|(k, v)| {
                let var = Variable {
                    name: k.clone(),
                    value: v,
                    exported: true,
                    ..Variable::default()
                };
                (k, var)
            })
            .collect();
        Environment {
            vars: RwLock::new(vars),
            sync_process_env: true,
        }
    }

    /// Empty store that never writes to the process environment.
    pub fn detached() -> Self {
        Environment {
            vars: RwLock::new(HashMap::new()),
            sync_process_env: false,
        }
    }

    /// Independent copy for a subshell or function call. Writes to the copy do not
    /// leak back to this store or to the process environment.
    pub fn snapshot(&self) -> Self {
        Environment {
            vars: RwLock::new(self.read().clone()),
            sync_process_env: false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Variable>> {
        self.vars.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Variable>> {
        self.vars.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Caller holds the write lock.
    fn sync_set(&self, key: &str, value: &str) {
        if self.sync_process_env {
            // SAFETY: this is the only place the shell mutates its environment, and it is
            // serialized by the store's write lock. Children get an explicit env anyway.
            unsafe { std::env::set_var(key, value) };
        }
    }

    fn sync_remove(&self, key: &str) {
        if self.sync_process_env {
            // SAFETY: see `sync_set`.
            unsafe { std::env::remove_var(key) };
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).map(|v| v.value.clone())
    }

    /// Value for substitution: the store first, then the process environment, else empty.
    pub fn lookup(&self, key: &str) -> String {
        self.get(key)
            .or_else(|| std::env::var(key).ok())
            .unwrap_or_default()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), VarError> {
        let mut vars = self.write();
        let var = vars.entry(key.to_string()).or_insert_with(|| Variable::new(key));
        if var.readonly {
            return Err(VarError::ReadOnly(key.to_string()));
        }
        var.value = value.to_string();
        var.array = None;
        if var.exported {
            self.sync_set(key, value);
        }
        Ok(())
    }

    pub fn unset(&self, key: &str) -> Result<(), VarError> {
        let mut vars = self.write();
        match vars.get(key) {
            Some(var) if var.readonly => Err(VarError::ReadOnly(key.to_string())),
            Some(var) => {
                if var.exported {
                    self.sync_remove(key);
                }
                vars.remove(key);
                debug!(name = key, "variable unset");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Marks `key` exported, creating it empty when missing.
    pub fn export(&self, key: &str) {
        let mut vars = self.write();
        let var = vars.entry(key.to_string()).or_insert_with(|| Variable::new(key));
        var.exported = true;
        let value = var.value.clone();
        self.sync_set(key, &value);
    }

    pub fn export_with_value(&self, key: &str, value: &str) -> Result<(), VarError> {
        let mut vars = self.write();
        let var = vars.entry(key.to_string()).or_insert_with(|| Variable::new(key));
        if var.readonly {
            return Err(VarError::ReadOnly(key.to_string()));
        }
        var.value = value.to_string();
        var.array = None;
        var.exported = true;
        self.sync_set(key, value);
        Ok(())
    }

    pub fn set_readonly(&self, key: &str) {
        let mut vars = self.write();
        vars.entry(key.to_string())
            .or_insert_with(|| Variable::new(key))
            .readonly = true;
    }

    pub fn is_exported(&self, key: &str) -> bool {
        self.read().get(key).is_some_and(|v| v.exported)
    }

    pub fn is_readonly(&self, key: &str) -> bool {
        self.read().get(key).is_some_and(|v| v.readonly)
    }

    pub fn set_array(&self, key: &str, items: Vec<String>) -> Result<(), VarError> {
        let mut vars = self.write();
        let var = vars.entry(key.to_string()).or_insert_with(|| Variable::new(key));
        if var.readonly {
            return Err(VarError::ReadOnly(key.to_string()));
        }
        // The scalar view of an array is its first element.
        var.value = items.first().cloned().unwrap_or_default();
        var.array = Some(items);
        if var.exported {
            let value = var.value.clone();
            self.sync_set(key, &value);
        }
        Ok(())
    }

    pub fn get_array(&self, key: &str) -> Option<Vec<String>> {
        self.read().get(key).and_then(|v| v.array.clone())
    }

    /// Writes one element, growing the array with empty strings as needed.
    pub fn set_array_element(&self, key: &str, index: usize, value: &str) -> Result<(), VarError> {
        let mut vars = self.write();
        let var = vars.entry(key.to_string()).or_insert_with(|| Variable::new(key));
        if var.readonly {
            return Err(VarError::ReadOnly(key.to_string()));
        }
        let items = var.array.get_or_insert_with(Vec::new);
        if items.len() <= index {
            items.resize(index + 1, String::new());
        }
        items[index] = value.to_string();
        var.value = items.first().cloned().unwrap_or_default();
        if var.exported {
            let value = var.value.clone();
            self.sync_set(key, &value);
        }
        Ok(())
    }

    pub fn get_array_element(&self, key: &str, index: usize) -> Result<Option<String>, VarError> {
        let vars = self.read();
        match vars.get(key) {
            None => Ok(None),
            Some(Variable { array: Some(items), .. }) => Ok(items.get(index).cloned()),
            // A scalar behaves as a one-element array.
            Some(var) if var.array.is_none() && index == 0 => Ok(Some(var.value.clone())),
            Some(_) => Err(VarError::NotAnArray(key.to_string())),
        }
    }

    /// All variables, sorted by name.
    pub fn all(&self) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self.read().values().cloned().collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }

    /// Exported `(name, value)` pairs, sorted by name. This is the complete
    /// environment handed to spawned processes.
    pub fn exported_vars(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .read()
            .values()
            .filter(|v| v.exported)
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_includes_os_env() {
        let env = Environment::new();
        assert!(!env.all().is_empty());
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(env.get("PATH"), Some(path));
            assert!(env.is_exported("PATH"));
        }
    }

    #[test]
    fn test_set_and_get() {
        let env = Environment::detached();
        env.set("FOO", "bar").unwrap();
        assert_eq!(env.get("FOO"), Some("bar".to_string()));
        assert!(!env.is_exported("FOO"));
    }

    #[test]
    fn test_lookup_falls_back_to_process_env_then_empty() {
        let env = Environment::detached();
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(env.lookup("HOME"), home);
        }
        assert_eq!(env.lookup("TINYSH_TEST_SURELY_UNSET_VAR"), "");
    }

    #[test]
    fn test_unset() {
        let env = Environment::detached();
        env.set("FOO", "bar").unwrap();
        env.unset("FOO").unwrap();
        assert_eq!(env.get("FOO"), None);
        // Unsetting a missing name is fine
        env.unset("FOO").unwrap();
    }

    #[test]
    fn test_readonly_rejects_set_and_unset() {
        let env = Environment::detached();
        env.set("RO", "1").unwrap();
        env.set_readonly("RO");
        assert_eq!(env.set("RO", "2"), Err(VarError::ReadOnly("RO".into())));
        assert_eq!(env.unset("RO"), Err(VarError::ReadOnly("RO".into())));
        assert_eq!(env.set_array("RO", vec![]), Err(VarError::ReadOnly("RO".into())));
        assert_eq!(env.get("RO"), Some("1".to_string()));
        assert!(env.is_readonly("RO"));
    }

    #[test]
    fn test_exported_writes_reach_process_env() {
        let env = Environment::new();
        env.set("TINYSH_TEST_EXPORT_SYNC", "one").unwrap();
        assert!(std::env::var("TINYSH_TEST_EXPORT_SYNC").is_err());

        env.export("TINYSH_TEST_EXPORT_SYNC");
        assert_eq!(std::env::var("TINYSH_TEST_EXPORT_SYNC").as_deref(), Ok("one"));

        env.set("TINYSH_TEST_EXPORT_SYNC", "two").unwrap();
        assert_eq!(std::env::var("TINYSH_TEST_EXPORT_SYNC").as_deref(), Ok("two"));

        env.unset("TINYSH_TEST_EXPORT_SYNC").unwrap();
        assert!(std::env::var("TINYSH_TEST_EXPORT_SYNC").is_err());
    }

    #[test]
    fn test_snapshot_does_not_leak() {
        let env = Environment::new();
        env.export_with_value("TINYSH_TEST_SNAPSHOT", "outer").unwrap();
        let scoped = env.snapshot();
        scoped.set("TINYSH_TEST_SNAPSHOT", "inner").unwrap();
        scoped.set("ONLY_INSIDE", "x").unwrap();

        assert_eq!(env.get("TINYSH_TEST_SNAPSHOT"), Some("outer".to_string()));
        assert_eq!(std::env::var("TINYSH_TEST_SNAPSHOT").as_deref(), Ok("outer"));
        assert_eq!(env.get("ONLY_INSIDE"), None);
        // The scoped copy still hands its own value to children
        assert!(
            scoped
                .exported_vars()
                .contains(&("TINYSH_TEST_SNAPSHOT".to_string(), "inner".to_string()))
        );
        env.unset("TINYSH_TEST_SNAPSHOT").unwrap();
    }

    #[test]
    fn test_arrays() {
        let env = Environment::detached();
        env.set_array("ARR", vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(env.get_array("ARR"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(env.get("ARR"), Some("a".to_string()));
        assert_eq!(env.get_array_element("ARR", 1), Ok(Some("b".to_string())));
        assert_eq!(env.get_array_element("ARR", 5), Ok(None));

        env.set_array_element("ARR", 3, "d").unwrap();
        assert_eq!(
            env.get_array("ARR"),
            Some(vec!["a".to_string(), "b".to_string(), String::new(), "d".to_string()])
        );

        env.set("S", "scalar").unwrap();
        assert_eq!(env.get_array_element("S", 0), Ok(Some("scalar".to_string())));
        assert_eq!(env.get_array_element("S", 1), Err(VarError::NotAnArray("S".into())));
        assert_eq!(env.get_array_element("MISSING", 0), Ok(None));
    }

    #[test]
    fn test_all_and_exported_vars_are_sorted() {
        let env = Environment::detached();
        env.set("B", "2").unwrap();
        env.export_with_value("C", "3").unwrap();
        env.export_with_value("A", "1").unwrap();
        let names: Vec<String> = env.all().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(
            env.exported_vars(),
            vec![("A".to_string(), "1".to_string()), ("C".to_string(), "3".to_string())]
        );
    }
}
