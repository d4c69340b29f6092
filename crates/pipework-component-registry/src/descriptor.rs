use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

/// Everything the platform knows about a component a service activity can
/// run: identity, the schemas of its inputs and outputs, and the form used to
/// edit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
  pub code: String,
  pub name: String,
  #[serde(default)]
  pub group_name: String,
  #[serde(default)]
  pub inputs: Value,
  #[serde(default)]
  pub outputs: Value,
  #[serde(default)]
  pub form: Value,
  #[serde(default = "enabled_by_default")]
  pub enabled: bool,
}

fn enabled_by_default() -> bool {
  true
}

impl ComponentDescriptor {
  pub fn new(code: impl Into<String>, name: impl Into<String>, group_name: impl Into<String>) -> Self {
    Self {
      code: code.into(),
      name: name.into(),
      group_name: group_name.into(),
      inputs: Value::Array(Vec::new()),
      outputs: Value::Array(Vec::new()),
      form: Value::Null,
      enabled: true,
    }
  }

  pub fn with_inputs(mut self, inputs: Value) -> Self {
    self.inputs = inputs;
    self
  }

  pub fn with_outputs(mut self, outputs: Value) -> Self {
    self.outputs = outputs;
    self
  }

  pub fn with_form(mut self, form: Value) -> Self {
    self.form = form;
    self
  }

  pub fn disabled(mut self) -> Self {
    self.enabled = false;
    self
  }

  /// Name recorded in the component catalog: `"{group}-{name}"`.
  pub fn catalog_name(&self) -> String {
    format!("{}-{}", self.group_name, self.name)
  }

  pub(crate) fn check(&self) -> Result<(), RegistryError> {
    if self.code.trim().is_empty() {
      return Err(RegistryError::InvalidDescriptor(
        "component code must not be empty".to_string(),
      ));
    }
    if self.name.trim().is_empty() {
      return Err(RegistryError::InvalidDescriptor(format!(
        "component '{}' has an empty name",
        self.code
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_defaults() {
    let descriptor: ComponentDescriptor =
      serde_json::from_str(r#"{"code": "sleep_timer", "name": "Sleep"}"#).unwrap();

    assert!(descriptor.enabled);
    assert_eq!(descriptor.group_name, "");
    assert!(descriptor.inputs.is_null());
  }

  #[test]
  fn test_catalog_name() {
    let descriptor = ComponentDescriptor::new("sleep_timer", "Sleep", "timer");
    assert_eq!(descriptor.catalog_name(), "timer-Sleep");
  }

  #[test]
  fn test_check_rejects_blank_code() {
    let descriptor = ComponentDescriptor::new("  ", "Sleep", "timer");
    assert!(matches!(
      descriptor.check(),
      Err(RegistryError::InvalidDescriptor(_))
    ));
  }
}
