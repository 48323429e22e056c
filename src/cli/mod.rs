//! IP-009: CLI subcommands — init, validate, plan, policy.

use crate::core::{parser, planner, types};
use clap::Subcommand;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new project file
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate project.yaml and report what it resolves to
    Validate {
        /// Path to project.yaml
        #[arg(short, long, default_value = "project.yaml")]
        file: PathBuf,
    },

    /// Show the ordered resource plan
    Plan {
        /// Path to project.yaml
        #[arg(short, long, default_value = "project.yaml")]
        file: PathBuf,

        /// Print the full resource graph as JSON
        #[arg(long)]
        json: bool,

        /// Resolve environments one after another instead of in parallel
        #[arg(long)]
        sequential: bool,

        /// Stop each environment after creating a new network
        #[arg(long)]
        network_only: bool,

        /// Only show resources of this environment (shared resources are always shown)
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Print the composed IAM policy documents
    Policy {
        /// Path to project.yaml
        #[arg(short, long, default_value = "project.yaml")]
        file: PathBuf,

        /// Only this role: build, execution, task, app
        #[arg(short, long)]
        role: Option<String>,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan {
            file,
            json,
            sequential,
            network_only,
            env,
        } => {
            let options = types::PlanOptions {
                parallel: !sequential,
                network_only_bootstrap: network_only,
            };
            cmd_plan(&file, &options, json, env.as_deref())
        }
        Commands::Policy { file, role } => cmd_policy(&file, role.as_deref()),
    }
}

const TEMPLATE: &str = r#"owner: my-org
repository: my-app
environments: [staging, production]

target:
  account: "123456789012"
  region: us-east-1

dns:
  domain: example.com

vpc:
  reuse: false
  # external_id: vpc-0123456789abcdef0

storage:
  reuse: false

task:
  memory_mib: 512
  cpu: 256

secrets:
  staging:
    PORT: 3000
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("project.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&config_path, TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::load_project(file).map_err(|e| e.to_string())?;
    let network = match config.external_id() {
        Some(id) => format!("reuse {}", id),
        None => "create".to_string(),
    };
    println!(
        "OK: {}/{} ({} environments, network: {}, storage: {})",
        config.owner,
        config.repository,
        config.environments.len(),
        network,
        if config.storage_reuse { "reuse" } else { "create" }
    );
    Ok(())
}

fn cmd_plan(
    file: &Path,
    options: &types::PlanOptions,
    json: bool,
    env_filter: Option<&str>,
) -> Result<(), String> {
    let config = parser::load_project(file).map_err(|e| e.to_string())?;
    if let Some(env) = env_filter {
        if config.environment_index(&types::Environment::new(env)).is_none() {
            return Err(format!("unknown environment: {}", env));
        }
    }
    let graph = planner::plan(&config, options).map_err(|e| e.to_string())?;

    if json {
        let out = serde_json::to_string_pretty(&graph)
            .map_err(|e| format!("JSON serialize error: {}", e))?;
        println!("{}", out);
    } else {
        let name = format!("{}/{}", config.owner, config.repository);
        print!("{}", render_plan(&name, &graph, env_filter));
    }
    Ok(())
}

/// Human-readable plan, grouped by environment.
fn render_plan(name: &str, graph: &types::ResourceGraph, env_filter: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Planning: {} ({} resources)", name, graph.resources.len());
    let _ = writeln!(out);

    let mut current_group = String::new();
    for id in &graph.order {
        let d = match graph.resources.get(id) {
            Some(d) => d,
            None => continue,
        };
        let group = d
            .environment
            .as_ref()
            .map_or("shared", types::Environment::as_str);
        if let (Some(filter), Some(env)) = (env_filter, &d.environment) {
            if env.as_str() != filter {
                continue;
            }
        }
        if group != current_group {
            current_group = group.to_string();
            let _ = writeln!(out, "{}:", current_group);
        }
        let symbol = match d.disposition {
            types::Disposition::Create => "+",
            types::Disposition::Reference => "=",
        };
        let _ = writeln!(out, "  {} {}", symbol, planner::describe(d));
    }

    let summary = planner::summarize(graph);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Plan: {} to create, {} to reference across {} environment(s).",
        summary.to_create, summary.to_reference, summary.environments
    );
    let counts: Vec<String> = summary
        .statements
        .iter()
        .map(|(role, n)| format!("{} {}", role, n))
        .collect();
    let _ = writeln!(
        out,
        "Policies: {} statements ({} unscoped).",
        counts.join(", "),
        summary.exceptions.len()
    );
    for (role, sid, reason) in &summary.exceptions {
        let _ = writeln!(out, "  ! {}/{}: {}", role, sid, reason);
    }
    let _ = writeln!(out, "Fingerprint: {}", graph.fingerprint);
    out
}

fn parse_role(s: &str) -> Result<types::Role, String> {
    types::Role::ALL
        .into_iter()
        .find(|r| r.to_string() == s)
        .ok_or_else(|| format!("unknown role '{}' (expected build, execution, task, app)", s))
}

fn cmd_policy(file: &Path, role: Option<&str>) -> Result<(), String> {
    let roles = match role {
        Some(r) => vec![parse_role(r)?],
        None => types::Role::ALL.to_vec(),
    };
    let config = parser::load_project(file).map_err(|e| e.to_string())?;
    let graph = planner::plan(&config, &types::PlanOptions::default()).map_err(|e| e.to_string())?;

    for role in roles {
        let set = graph.policies.get(role);
        let doc = serde_json::to_string_pretty(&set.to_document())
            .map_err(|e| format!("JSON serialize error: {}", e))?;
        println!("# {} ({})", set.name, role);
        println!("{}", doc);
    }
    Ok(())
}
