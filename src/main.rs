mod components;

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use pipework_manager::{
  InstanceManager, InstanceOverrides, ManagerError, StoreTemplateSource, TemplateManager,
};
use pipework_store::{SqliteStore, Store};
use pipework_validator::{RootTemplate, validate};

/// Pipework - pipeline templates and the instances created from them
#[derive(Parser)]
#[command(name = "pipework")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.pipework)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Database URL; overrides the database in the data directory
  #[arg(long, global = true, env = "PIPEWORK_DATABASE_URL")]
  database_url: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a pipeline tree without storing it
  Validate {
    /// Path to the pipeline tree (JSON), or - for stdin
    file: PathBuf,

    /// Validate as an update of this template
    #[arg(long)]
    template: Option<String>,
  },

  /// Manage pipeline templates
  Template {
    #[command(subcommand)]
    action: TemplateAction,
  },

  /// Manage pipeline instances
  Instance {
    #[command(subcommand)]
    action: InstanceAction,
  },

  /// Manage saved node selections of a template
  Scheme {
    #[command(subcommand)]
    action: SchemeAction,
  },

  /// Inspect registered components
  Component {
    #[command(subcommand)]
    action: ComponentAction,
  },

  /// Snapshot maintenance
  Snapshot {
    #[command(subcommand)]
    action: SnapshotAction,
  },
}

#[derive(Subcommand)]
enum TemplateAction {
  /// Validate and store a new template
  Create {
    /// Path to the pipeline tree (JSON), or - for stdin
    file: PathBuf,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "pipework")]
    creator: String,
    /// Use this template id instead of a generated one
    #[arg(long)]
    id: Option<String>,
  },

  /// Replace a template's definition
  Update {
    template_id: String,
    /// Path to the pipeline tree (JSON), or - for stdin
    file: PathBuf,
    #[arg(long, default_value = "pipework")]
    editor: String,
    #[arg(long)]
    name: Option<String>,
  },

  /// Delete one or more templates
  Delete {
    #[arg(required = true)]
    template_ids: Vec<String>,
  },

  /// Print a template with its definition
  Show { template_id: String },

  /// List templates
  List,
}

#[derive(Subcommand)]
enum InstanceAction {
  /// Instantiate a template
  Create {
    template_id: String,
    #[arg(long, default_value = "pipework")]
    creator: String,
    #[arg(long)]
    name: Option<String>,
    /// Use this instance id instead of a generated one
    #[arg(long)]
    id: Option<String>,
    /// Execute this pipeline tree instead of the template's definition
    #[arg(long)]
    exec_file: Option<PathBuf>,
  },

  /// Mark an instance started
  Start { instance_id: String },

  /// Mark an instance finished
  Finish { instance_id: String },

  /// Delete one or more instances
  Delete {
    #[arg(required = true)]
    instance_ids: Vec<String>,
  },

  /// Print an instance with its execution tree
  Show { instance_id: String },

  /// List instances
  List {
    /// Only instances of this template
    #[arg(long)]
    template: Option<String>,
  },

  /// Replace the execution tree of an instance that has not started
  ReplaceExec {
    instance_id: String,
    /// Path to the pipeline tree (JSON), or - for stdin
    file: PathBuf,
  },
}

#[derive(Subcommand)]
enum SchemeAction {
  /// Save a named node selection
  Save {
    template_id: String,
    name: String,
    node_ids: Vec<String>,
  },

  /// List the schemes of a template
  List { template_id: String },
}

#[derive(Subcommand)]
enum ComponentAction {
  /// List enabled components
  List,
}

#[derive(Subcommand)]
enum SnapshotAction {
  /// Delete snapshots no template or instance uses
  Gc,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let Some(command) = cli.command else {
    println!("pipework - use --help to see available commands");
    return Ok(());
  };

  let database_url = match cli.database_url {
    Some(url) => url,
    None => {
      let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::home_dir()
          .context("could not determine home directory")?
          .join(".pipework"),
      };
      std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
      format!("sqlite://{}", data_dir.join("pipework.db").display())
    }
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, &database_url).await })
}

async fn run(command: Commands, database_url: &str) -> Result<()> {
  let store = Arc::new(
    SqliteStore::connect(database_url)
      .await
      .with_context(|| format!("failed to open database: {database_url}"))?,
  );
  let registry = components::install(store.clone()).await?;

  let templates = TemplateManager::new(store.clone());
  let instances = InstanceManager::new(store.clone());

  match command {
    Commands::Validate { file, template } => {
      let payload = read_payload(&file)?;
      let root = match template {
        Some(template_id) => {
          let existing = templates.get(&template_id).await.map_err(reported)?;
          RootTemplate::existing(existing.template_id, existing.name)
        }
        None => RootTemplate::New,
      };

      let source = StoreTemplateSource::new(store.as_ref());
      match validate(&payload, &root, &source).await {
        Ok(validated) => {
          for (activity_id, code) in validated.tree.component_refs() {
            if !registry.contains(code) {
              eprintln!("warning: activity '{activity_id}' uses unregistered component '{code}'");
            }
          }
          println!("valid");
        }
        Err(e) => {
          print_json(&e.report())?;
          anyhow::bail!("validation failed");
        }
      }
    }

    Commands::Template { action } => match action {
      TemplateAction::Create {
        file,
        name,
        creator,
        id,
      } => {
        let payload = read_payload(&file)?;
        let template = templates
          .create(&payload, &creator, &name, id)
          .await
          .map_err(reported)?;
        print_json(&template)?;
      }
      TemplateAction::Update {
        template_id,
        file,
        editor,
        name,
      } => {
        let payload = read_payload(&file)?;
        let template = templates
          .update(&template_id, &payload, &editor, name.as_deref())
          .await
          .map_err(reported)?;
        print_json(&template)?;
      }
      TemplateAction::Delete { template_ids } => {
        let deleted = templates.delete(template_ids).await.map_err(reported)?;
        eprintln!("Deleted {deleted} template(s)");
      }
      TemplateAction::Show { template_id } => {
        let template = templates.get(&template_id).await.map_err(reported)?;
        print_json(&template)?;
      }
      TemplateAction::List => {
        for template in templates.list().await.map_err(reported)? {
          println!("{}\t{}", template.template_id, template.name);
        }
      }
    },

    Commands::Instance { action } => match action {
      InstanceAction::Create {
        template_id,
        creator,
        name,
        id,
        exec_file,
      } => {
        let exec_data = exec_file.as_deref().map(read_payload).transpose()?;
        let overrides = InstanceOverrides {
          name,
          exec_data,
          instance_id: id,
        };
        let instance = instances
          .create(&template_id, &creator, overrides)
          .await
          .map_err(reported)?;
        print_json(&instance)?;
      }
      InstanceAction::Start { instance_id } => {
        let instance = instances.set_started(&instance_id).await.map_err(reported)?;
        print_json(&instance)?;
      }
      InstanceAction::Finish { instance_id } => {
        let instance = instances.set_finished(&instance_id).await.map_err(reported)?;
        print_json(&instance)?;
      }
      InstanceAction::Delete { instance_ids } => {
        let deleted = instances.delete(instance_ids).await.map_err(reported)?;
        eprintln!("Deleted {deleted} instance(s)");
      }
      InstanceAction::Show { instance_id } => {
        let instance = instances.get(&instance_id).await.map_err(reported)?;
        print_json(&instance)?;
      }
      InstanceAction::List { template } => {
        for instance in instances
          .list(template.as_deref())
          .await
          .map_err(reported)?
        {
          println!(
            "{}\t{}\t{:?}",
            instance.instance_id, instance.name, instance.state
          );
        }
      }
      InstanceAction::ReplaceExec { instance_id, file } => {
        let payload = read_payload(&file)?;
        let instance = instances
          .replace_execution_data(&instance_id, &payload)
          .await
          .map_err(reported)?;
        print_json(&instance)?;
      }
    },

    Commands::Scheme { action } => match action {
      SchemeAction::Save {
        template_id,
        name,
        node_ids,
      } => {
        let scheme = templates
          .save_scheme(&template_id, &name, node_ids)
          .await
          .map_err(reported)?;
        print_json(&scheme)?;
      }
      SchemeAction::List { template_id } => {
        let schemes = templates
          .list_schemes(&template_id)
          .await
          .map_err(reported)?;
        print_json(&schemes)?;
      }
    },

    Commands::Component {
      action: ComponentAction::List,
    } => {
      print_json(&registry.list_enabled())?;
    }

    Commands::Snapshot {
      action: SnapshotAction::Gc,
    } => {
      let purged = store
        .purge_orphan_snapshots()
        .await
        .context("failed to purge snapshots")?;
      eprintln!("Purged {purged} snapshot(s)");
    }
  }

  Ok(())
}

/// Print the field-level report of a validation failure before handing the
/// error to anyhow.
fn reported(err: ManagerError) -> anyhow::Error {
  if let Some(report) = err.report() {
    if let Ok(json) = serde_json::to_string_pretty(&report) {
      println!("{json}");
    }
  }
  err.into()
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn read_payload(path: &Path) -> Result<Value> {
  let content = if path == Path::new("-") {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read pipeline tree from stdin")?;
    input
  } else {
    std::fs::read_to_string(path)
      .with_context(|| format!("failed to read pipeline tree: {}", path.display()))?
  };

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse pipeline tree: {}", path.display()))
}
