use std::collections::HashMap;
use std::sync::RwLock;

use log::info;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("contract not found: {0}")]
    NotFound(String),
    #[error("contract already exists: {0}")]
    AlreadyExists(String),
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    #[error("invalid or missing parameter: {0}")]
    InvalidParam(String),
    #[error("contract {0} is deployed but has no runtime")]
    NoRuntime(String),
}

/// A contract the node can run by name.
pub trait ExecutableContract: Send + Sync {
    fn name(&self) -> &str;
    fn execute(&self, method: &str, params: &Map<String, Value>) -> Result<Value, ContractError>;
}

/// Adds the numeric parameters `a` and `b`.
#[derive(Debug, Default)]
pub struct AdditionContract;

fn number(params: &Map<String, Value>, key: &str) -> Result<f64, ContractError> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ContractError::InvalidParam(key.to_string()))
}

impl ExecutableContract for AdditionContract {
    fn name(&self) -> &str {
        "AdditionContract"
    }

    fn execute(&self, method: &str, params: &Map<String, Value>) -> Result<Value, ContractError> {
        if method != "add" {
            return Err(ContractError::UnsupportedMethod(method.to_string()));
        }
        let a = number(params, "a")?;
        let b = number(params, "b")?;
        Ok(Value::from(a + b))
    }
}

/// Raw bytecode registered through the deploy endpoint.
#[derive(Debug, Clone)]
pub struct ContractDefinition {
    pub name: String,
    pub code: Vec<u8>,
}

/// Name -> contract lookup. Executable implementations and deployed
/// bytecode live side by side; only the former can run.
#[derive(Default)]
pub struct ContractRegistry {
    executable: RwLock<HashMap<String, Box<dyn ExecutableContract>>>,
    deployed: RwLock<HashMap<String, ContractDefinition>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in contracts.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        // a fresh registry cannot already hold the name
        let _ = registry.register(Box::new(AdditionContract));
        registry
    }

    pub fn register(&self, contract: Box<dyn ExecutableContract>) -> Result<(), ContractError> {
        let mut map = self.executable.write().expect("rwlock poisoned");
        let name = contract.name().to_string();
        if map.contains_key(&name) {
            return Err(ContractError::AlreadyExists(name));
        }
        info!("CONTRACT - '{name}' registered");
        map.insert(name, contract);
        Ok(())
    }

    pub fn deploy(&self, def: ContractDefinition) -> Result<(), ContractError> {
        let mut map = self.deployed.write().expect("rwlock poisoned");
        if map.contains_key(&def.name) {
            return Err(ContractError::AlreadyExists(def.name));
        }
        info!(
            "CONTRACT - '{}' deployed ({} bytes)",
            def.name,
            def.code.len()
        );
        map.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn deployed(&self, name: &str) -> Option<ContractDefinition> {
        let map = self.deployed.read().expect("rwlock poisoned");
        map.get(name).cloned()
    }

    /// Names of every executable and deployed contract, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .executable
            .read()
            .expect("rwlock poisoned")
            .keys()
            .cloned()
            .collect();
        names.extend(
            self.deployed
                .read()
                .expect("rwlock poisoned")
                .keys()
                .cloned(),
        );
        names.sort();
        names.dedup();
        names
    }

    pub fn execute(
        &self,
        name: &str,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ContractError> {
        {
            let map = self.executable.read().expect("rwlock poisoned");
            if let Some(contract) = map.get(name) {
                return contract.execute(method, params);
            }
        }
        if self.deployed(name).is_some() {
            return Err(ContractError::NoRuntime(name.to_string()));
        }
        Err(ContractError::NotFound(name.to_string()))
    }
}
