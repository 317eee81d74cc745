//! Serializable program definitions resolved against a [FunctionRegistry].
//!
//! A definition names functions by reference; the registry supplies the
//! actual steps when the definition is loaded:
//!
//! ```json
//! {
//!   "id": "chat",
//!   "functions": [
//!     { "id": "ask", "function": "prompt", "routes": { "quit": "return" } },
//!     { "id": "reply", "function": "echo", "next": "ask" }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ConfigError;
use crate::program::{Program, ProgramBuilder};
use crate::types::Step;

/// One function table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
  pub id: String,
  /// Registry name of the step to run.
  pub function: String,
  /// Action name -> target function id or sentinel.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub routes: BTreeMap<String, String>,
  /// Explicit successor.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
}

/// Declarative description of a [Program].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDefinition {
  #[serde(default)]
  pub id: Option<String>,
  pub functions: Vec<FunctionDescriptor>,
}

impl ProgramDefinition {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn to_json(&self) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Resolves every function reference and builds the program.
  #[instrument(level = "trace", skip(self, registry))]
  pub fn load(&self, registry: &FunctionRegistry) -> Result<Program, ConfigError> {
    let mut builder = match &self.id {
      Some(id) => ProgramBuilder::with_id(id.clone()),
      None => ProgramBuilder::new(),
    };
    for descriptor in &self.functions {
      let step = registry.get(&descriptor.function).ok_or_else(|| {
        ConfigError::UnknownFunctionReference {
          id: descriptor.id.clone(),
          reference: descriptor.function.clone(),
        }
      })?;
      builder.add_function(&descriptor.id, step)?;
    }
    for descriptor in &self.functions {
      builder.add_routes(
        &descriptor.id,
        descriptor
          .routes
          .iter()
          .map(|(action, target)| (action.clone(), target.as_str())),
      )?;
      if let Some(next) = &descriptor.next {
        builder.add_step(&descriptor.id, next.as_str())?;
      }
    }
    debug!(function_count = self.functions.len(), "definition loaded");
    builder.build()
  }
}

/// Named steps a [ProgramDefinition] can reference.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
  steps: HashMap<String, Arc<dyn Step>>,
}

impl FunctionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, name: &str, step: Arc<dyn Step>) -> Result<(), ConfigError> {
    if self.steps.contains_key(name) {
      return Err(ConfigError::DuplicateFunction(name.to_string()));
    }
    self.steps.insert(name.to_string(), step);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
    self.steps.get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.steps.contains_key(name)
  }
}

impl std::fmt::Debug for FunctionRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<_> = self.steps.keys().collect();
    names.sort();
    f.debug_struct("FunctionRegistry")
      .field("steps", &names)
      .finish()
  }
}
