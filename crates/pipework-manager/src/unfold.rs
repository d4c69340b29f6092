//! Sub-process unfolding.
//!
//! Every `SubProcess` activity of an execution tree receives a `pipeline`
//! field holding the referenced template's tree, itself unfolded, with the
//! activity id as its tree id. The runtime can then walk the whole execution
//! without looking templates up.

use pipework_store::Store;
use pipework_validator::{RootTemplate, ValidateError};
use serde_json::Value;
use tracing::debug;

use crate::error::ManagerError;

/// A template on the current unfolding path: (id, display name).
type Frame = (String, String);

/// Inline the trees of all referenced templates into `tree`, recursively.
///
/// `root` is the template `tree` belongs to. A reference back to any
/// template on the current path fails with `CircularReference`, traced by
/// template name from the repeated template back to itself.
pub async fn unfold_subprocesses<S>(
  store: &S,
  tree: &mut Value,
  root: &RootTemplate,
) -> Result<(), ManagerError>
where
  S: Store + ?Sized,
{
  let mut stack = vec![(root.id().to_string(), root.name().to_string())];
  unfold(store, tree, &mut stack).await
}

async fn unfold<S>(store: &S, tree: &mut Value, stack: &mut Vec<Frame>) -> Result<(), ManagerError>
where
  S: Store + ?Sized,
{
  let Some(activities) = tree.get_mut("activities").and_then(Value::as_object_mut) else {
    return Ok(());
  };

  for (activity_id, activity) in activities.iter_mut() {
    let Some(fields) = activity.as_object_mut() else {
      continue;
    };
    if fields.get("type").and_then(Value::as_str) != Some("SubProcess") {
      continue;
    }
    let Some(template_id) = fields
      .get("template_id")
      .and_then(Value::as_str)
      .map(str::to_string)
    else {
      continue;
    };

    if let Some(entry) = stack.iter().position(|(id, _)| *id == template_id) {
      let mut trace: Vec<String> = stack[entry..].iter().map(|(_, name)| name.clone()).collect();
      trace.push(stack[entry].1.clone());
      return Err(ValidateError::CircularReference { trace }.into());
    }

    let (mut child, name) = load_tree(store, activity_id, &template_id).await?;
    stack.push((template_id, name));
    Box::pin(unfold(store, &mut child, stack)).await?;
    stack.pop();

    if let Some(child_fields) = child.as_object_mut() {
      child_fields.insert("id".to_string(), Value::String(activity_id.clone()));
    }
    debug!(activity_id = %activity_id, "unfolded sub-process");
    fields.insert("pipeline".to_string(), child);
  }

  Ok(())
}

/// The stored tree of a live template, and its name.
async fn load_tree<S>(
  store: &S,
  activity_id: &str,
  template_id: &str,
) -> Result<(Value, String), ManagerError>
where
  S: Store + ?Sized,
{
  let unknown = || ValidateError::UnknownSubprocess {
    activity_id: activity_id.to_string(),
    template_id: template_id.to_string(),
  };

  let template = match store.get_template(template_id).await {
    Ok(template) if !template.is_deleted => template,
    Ok(_) | Err(pipework_store::Error::NotFound(_)) => return Err(unknown().into()),
    Err(e) => return Err(e.into()),
  };
  let snapshot = store.get_snapshot(template.snapshot_id).await?;

  Ok((snapshot.data.0, template.name))
}
