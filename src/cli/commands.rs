use clap::{Parser, Subcommand};
use rusqlite::Connection;
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{BankGroup, CatalogRow, RoleContext, StageRef};
use crate::repo::{GroupRepo, StageRepo, StatementRecord, StatementRepo};
use crate::workflow::{
    standard_catalog_rows, StageCatalog, StageEngine, Subject, VariantRegistry, Workflow, AUTO_CHECK_STAGE,
    STANDARD_VARIANT,
};
use crate::cli::error::{user_error, validate_group_name, validate_role, validate_statement_id};
use crate::cli::output::{format_catalog_table, format_comparison, format_next_stages, format_statement_summary, statement_json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Stagehand - stage workflow engine for bank application statements")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Acting role (defaults to `role=` from the rc file, then `auto`)
    #[arg(long, global = true)]
    pub role: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bank group management commands
    Groups {
        #[command(subcommand)]
        subcommand: GroupCommands,
    },
    /// Stage catalog commands
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogCommands,
    },
    /// Create a new statement
    Add {
        /// Bank group name
        group: String,
        /// Initial stage (defaults to `new`)
        #[arg(long)]
        stage: Option<String>,
        /// Require an automated scoring check before the next transition
        #[arg(long)]
        scoring_wait: bool,
    },
    /// List statements of a group
    List {
        /// Bank group name
        group: String,
    },
    /// Show a statement
    Show {
        /// Statement ID
        id: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// List the stages a statement can move to
    Next {
        /// Statement ID
        id: String,
    },
    /// Move a statement to another stage
    Move {
        /// Statement ID
        id: String,
        /// Target stage name or id
        stage: String,
        /// Sub-stage to land in
        #[arg(long)]
        sub: Option<String>,
        /// Skip the transition rules (scoring deferral still applies)
        #[arg(long)]
        force: bool,
    },
    /// Set the sub-stage of a statement (`0` clears it)
    Sub {
        /// Statement ID
        id: String,
        /// Sub-stage name or id
        substage: String,
    },
    /// Turn the scoring wait flag on or off
    Scoring {
        /// Statement ID
        id: String,
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Compare the current stage with another stage by priority
    Compare {
        /// Statement ID
        id: String,
        /// Stage name or id to compare against
        stage: String,
        /// Is the current stage before STAGE
        #[arg(long, conflicts_with = "after", required_unless_present = "after")]
        before: bool,
        /// Is the current stage after STAGE
        #[arg(long)]
        after: bool,
        /// Count equal priority as a match
        #[arg(long)]
        inclusive: bool,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a bank group
    Add {
        /// Group name
        name: String,
        /// Workflow variant
        #[arg(long, default_value = STANDARD_VARIANT)]
        variant: String,
        /// Load the built-in standard catalog
        #[arg(long)]
        seed: bool,
    },
    /// List bank groups
    List,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Import catalog rows from a JSON file
    Import {
        /// Bank group name
        group: String,
        /// JSON array of catalog rows
        file: PathBuf,
    },
    /// List the stages of a group
    List {
        /// Bank group name
        group: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    let role_name = cli.role.clone().unwrap_or_else(|| config.role().to_string());
    if let Err(e) = validate_role(&role_name) {
        user_error(&e);
    }
    let role = RoleContext::new(&role_name);

    let conn = DbConnection::connect_at(&config.database_path())
        .context("Failed to connect to database")?;
    let registry = VariantRegistry::with_defaults();

    match cli.command {
        Commands::Groups { subcommand } => match subcommand {
            GroupCommands::Add { name, variant, seed } => handle_groups_add(&conn, &registry, &name, &variant, seed),
            GroupCommands::List => handle_groups_list(&conn),
        },
        Commands::Catalog { subcommand } => match subcommand {
            CatalogCommands::Import { group, file } => handle_catalog_import(&conn, &group, &file),
            CatalogCommands::List { group } => handle_catalog_list(&conn, &registry, &group, &role),
        },
        Commands::Add { group, stage, scoring_wait } => {
            handle_add(&conn, &registry, &group, stage.as_deref(), scoring_wait)
        }
        Commands::List { group } => handle_list(&conn, &registry, &group, role),
        Commands::Show { id, json } => handle_show(&conn, &registry, &id, role, json),
        Commands::Next { id } => handle_next(&conn, &registry, &id, role),
        Commands::Move { id, stage, sub, force } => {
            handle_move(&conn, &registry, &id, role, &stage, sub.as_deref(), force)
        }
        Commands::Sub { id, substage } => handle_sub(&conn, &registry, &id, role, &substage),
        Commands::Scoring { id, state } => handle_scoring(&conn, &id, state == "on"),
        Commands::Compare { id, stage, before, after: _, inclusive } => {
            handle_compare(&conn, &registry, &id, role, &stage, before, inclusive)
        }
    }
}

fn find_group(conn: &Connection, name: &str) -> Result<BankGroup> {
    match GroupRepo::get_by_name(conn, name)? {
        Some(group) => Ok(group),
        None => user_error(&format!("Group '{}' not found", name)),
    }
}

fn group_id(group: &BankGroup) -> Result<i64> {
    group.id.context("Bank group has no id")
}

fn load_workflow(conn: &Connection, registry: &VariantRegistry, group: &BankGroup) -> Result<Workflow> {
    let group_id = group_id(group)?;
    if StageRepo::count(conn, group_id)? == 0 {
        user_error(&format!(
            "Group '{}' has no stage catalog. Import one with 'stagehand catalog import'.",
            group.name
        ));
    }
    let rules = match registry.get(&group.variant) {
        Ok(rules) => rules,
        Err(e) => user_error(&e.to_string()),
    };
    let catalog = StageRepo::load_catalog(conn, group_id)?;
    Ok(Workflow::new(Arc::new(catalog), rules))
}

/// Load statement `id_str` and bind an engine to it
fn open_engine<'c>(
    conn: &'c Connection,
    registry: &VariantRegistry,
    id_str: &str,
    role: RoleContext,
) -> Result<(StageEngine<StatementRecord<'c>>, BankGroup)> {
    let id = match validate_statement_id(id_str) {
        Ok(id) => id,
        Err(e) => user_error(&e),
    };
    let Some(record) = StatementRecord::load(conn, id)? else {
        user_error(&format!("Statement {} not found", id));
    };
    let group = GroupRepo::get_by_id(conn, record.statement().group_id)?
        .with_context(|| format!("Statement {} references a missing bank group", id))?;
    let workflow = load_workflow(conn, registry, &group)?;
    Ok((workflow.engine(record, role), group))
}

fn handle_groups_add(conn: &Connection, registry: &VariantRegistry, name: &str, variant: &str, seed: bool) -> Result<()> {
    if let Err(e) = validate_group_name(name) {
        user_error(&e);
    }
    if !registry.contains(variant) {
        user_error(&format!(
            "Unknown workflow variant '{}'. Known variants: {}",
            variant,
            registry.names().join(", ")
        ));
    }
    if GroupRepo::get_by_name(conn, name)?.is_some() {
        user_error(&format!("Group '{}' already exists", name));
    }

    let group = GroupRepo::create(conn, name, variant)?;
    println!("Created group {} '{}' ({})", group_id(&group)?, group.name, group.variant);

    if seed {
        let stages = StageRepo::import(conn, group_id(&group)?, &standard_catalog_rows())?;
        println!("Seeded {} stages", stages);
    }
    Ok(())
}

fn handle_groups_list(conn: &Connection) -> Result<()> {
    let groups = GroupRepo::list_all(conn)?;
    if groups.is_empty() {
        println!("No groups.");
        return Ok(());
    }
    for group in groups {
        let stages = StageRepo::count(conn, group_id(&group)?)?;
        println!("{:<24} {:<12} {} stages", group.name, group.variant, stages);
    }
    Ok(())
}

fn handle_catalog_import(conn: &Connection, group_name: &str, file: &Path) -> Result<()> {
    let group = find_group(conn, group_name)?;
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => user_error(&format!("Cannot read catalog file {}: {}", file.display(), e)),
    };
    let rows: Vec<CatalogRow> = match serde_json::from_str(&content) {
        Ok(rows) => rows,
        Err(e) => user_error(&format!("Invalid catalog file {}: {}", file.display(), e)),
    };
    if let Err(e) = StageCatalog::from_rows(rows.clone()) {
        user_error(&format!("Invalid catalog file {}: {}", file.display(), e));
    }

    let stages = StageRepo::import(conn, group_id(&group)?, &rows)?;
    println!("Imported {} stages into group '{}'", stages, group.name);
    Ok(())
}

fn handle_catalog_list(conn: &Connection, registry: &VariantRegistry, group_name: &str, role: &RoleContext) -> Result<()> {
    let group = find_group(conn, group_name)?;
    let workflow = load_workflow(conn, registry, &group)?;
    print!("{}", format_catalog_table(workflow.catalog(), role));
    Ok(())
}

fn handle_add(conn: &Connection, registry: &VariantRegistry, group_name: &str, stage: Option<&str>, scoring_wait: bool) -> Result<()> {
    let group = find_group(conn, group_name)?;
    let workflow = load_workflow(conn, registry, &group)?;
    let stage = stage.unwrap_or("new");
    let Some(def) = workflow.catalog().resolve(&StageRef::parse(stage)).filter(|def| def.id.is_stage()) else {
        user_error(&format!("Unknown stage '{}' in group '{}'", stage, group.name));
    };

    let statement = StatementRepo::create(conn, group_id(&group)?, def.id, scoring_wait)?;
    println!(
        "Created statement {} in stage {}",
        statement.id.map(|id| id.to_string()).unwrap_or_default(),
        def.name
    );
    Ok(())
}

fn handle_list(conn: &Connection, registry: &VariantRegistry, group_name: &str, role: RoleContext) -> Result<()> {
    let group = find_group(conn, group_name)?;
    let workflow = load_workflow(conn, registry, &group)?;
    let statements = StatementRepo::list_by_group(conn, group_id(&group)?)?;
    if statements.is_empty() {
        println!("No statements.");
        return Ok(());
    }
    for statement in statements {
        let id = statement.id.unwrap_or_default();
        let engine = workflow.engine(StatementRecord::new(conn, statement), role.clone());
        let stage = engine.current_stage().map(|def| def.name.as_str()).unwrap_or("?");
        let sub = engine.current_sub_stage().map(|def| def.name.as_str()).unwrap_or("-");
        println!("{:<6} {:<32} {:<16} {}", id, stage, sub, engine.stage_name(false));
    }
    Ok(())
}

fn handle_show(conn: &Connection, registry: &VariantRegistry, id: &str, role: RoleContext, json: bool) -> Result<()> {
    let (engine, group) = open_engine(conn, registry, id, role)?;
    let statement = engine.subject().statement();
    if json {
        println!("{}", serde_json::to_string_pretty(&statement_json(&engine, statement, &group))?);
    } else {
        print!("{}", format_statement_summary(&engine, statement, &group));
    }
    Ok(())
}

fn handle_next(conn: &Connection, registry: &VariantRegistry, id: &str, role: RoleContext) -> Result<()> {
    let (engine, _) = open_engine(conn, registry, id, role)?;
    print!("{}", format_next_stages(&engine));
    Ok(())
}

fn handle_move(
    conn: &Connection,
    registry: &VariantRegistry,
    id: &str,
    role: RoleContext,
    stage: &str,
    sub: Option<&str>,
    force: bool,
) -> Result<()> {
    let (mut engine, _) = open_engine(conn, registry, id, role)?;
    let from = engine.current_stage().map(|def| def.name.clone()).unwrap_or_else(|| "?".to_string());

    let moved = if force {
        engine.force_set_stage(stage, sub)?
    } else {
        engine.set_stage(stage, sub)?
    };
    if !moved {
        user_error(&format!(
            "Cannot move statement {} from '{}' to '{}' as {}",
            id, from, stage, engine.role()
        ));
    }

    let to = engine.current_stage().map(|def| def.name.as_str()).unwrap_or("?");
    println!("Statement {}: {} -> {}", id, from, to);
    if let Some(pending) = engine.state().pending_transition {
        if engine.is(AUTO_CHECK_STAGE) {
            let target = engine.id_to_name(pending.stage_id).unwrap_or("?");
            println!("Waiting for scoring; will continue to {}", target);
        }
    }
    Ok(())
}

fn handle_sub(conn: &Connection, registry: &VariantRegistry, id: &str, role: RoleContext, substage: &str) -> Result<()> {
    let (mut engine, _) = open_engine(conn, registry, id, role)?;
    if !engine.set_sub_stage(substage)? {
        user_error(&format!("Cannot set sub-stage '{}' on statement {}", substage, id));
    }
    let sub = engine.current_sub_stage().map(|def| def.name.as_str()).unwrap_or("(none)");
    println!("Statement {}: sub-stage {}", id, sub);
    Ok(())
}

/// The scoring flag and its pending transition belong to the external scoring
/// process, so this writes them directly instead of going through the engine.
fn handle_scoring(conn: &Connection, id_str: &str, wait: bool) -> Result<()> {
    let id = match validate_statement_id(id_str) {
        Ok(id) => id,
        Err(e) => user_error(&e),
    };
    let Some(mut record) = StatementRecord::load(conn, id)? else {
        user_error(&format!("Statement {} not found", id));
    };

    let state = record.stage_state_mut();
    state.scoring_wait = wait;
    if !wait {
        state.pending_transition = None;
    }
    record.save()?;
    println!("Statement {}: scoring {}", id, if wait { "on" } else { "off" });
    Ok(())
}

fn handle_compare(
    conn: &Connection,
    registry: &VariantRegistry,
    id: &str,
    role: RoleContext,
    stage: &str,
    before: bool,
    inclusive: bool,
) -> Result<()> {
    let (engine, _) = open_engine(conn, registry, id, role)?;
    let result = if before {
        engine.before(stage, inclusive)
    } else {
        engine.after(stage, inclusive)
    };
    println!("{}", format_comparison(result));
    Ok(())
}
