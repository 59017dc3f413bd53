use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::traits::{Function, FunctionProvider};

static REG: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(DashMap::new);

static BUILTINS: Lazy<()> = Lazy::new(crate::builtins::load_builtins);

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Register (or replace) a function under its upper-cased name.
pub fn register(f: Arc<dyn Function>) {
    Lazy::force(&BUILTINS);
    insert(f);
}

pub(crate) fn insert(f: Arc<dyn Function>) {
    REG.insert(key(f.name()), f);
}

pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    Lazy::force(&BUILTINS);
    REG.get(&key(name)).map(|v| Arc::clone(v.value()))
}

/// Provider backed by the process-wide registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinProvider;

impl FunctionProvider for BuiltinProvider {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FnCaps;

    #[test]
    fn lookup_is_case_insensitive() {
        let sum = get("sum").expect("SUM registered");
        assert_eq!(sum.name(), "SUM");
        assert!(get("NO_SUCH_FUNCTION").is_none());
    }

    #[test]
    fn volatility_comes_from_caps() {
        let provider = BuiltinProvider;
        assert!(provider.is_volatile("RAND"));
        assert!(provider.is_volatile("now"));
        assert!(!provider.is_volatile("SUM"));
        assert!(get("RAND").unwrap().caps().contains(FnCaps::VOLATILE));
    }
}
