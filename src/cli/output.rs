// Output formatting utilities

use crate::models::{BankGroup, RoleContext, StageDefinition, StageId, Statement};
use crate::workflow::{StageCatalog, StageEngine, Subject};
use chrono::Local;
use std::io::IsTerminal;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Apply bold formatting if in TTY mode
fn bold_if_tty(text: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", ANSI_BOLD, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

/// Format timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    use chrono::TimeZone;
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", ts),
    }
}

/// Format a tri-state comparison result
pub fn format_comparison(result: Option<bool>) -> &'static str {
    match result {
        Some(true) => "true",
        Some(false) => "false",
        None => "unknown",
    }
}

/// `name (#id)` for an id, or `#id?` when the catalog does not know it
fn describe_id(catalog: &StageCatalog, id: StageId) -> String {
    if id.is_none() {
        return "(none)".to_string();
    }
    match catalog.by_id(id) {
        Some(def) => format!("{} (#{})", def.name, id),
        None => format!("#{}?", id),
    }
}

/// Catalog listing, one line per stage or sub-stage
pub fn format_catalog_table(catalog: &StageCatalog, role: &RoleContext) -> String {
    let rows: Vec<[String; 6]> = catalog
        .iter()
        .map(|def| {
            [
                def.id.to_string(),
                def.name.clone(),
                def.side.clone(),
                def.priority.to_string(),
                if def.is_hidden_substage { "yes".to_string() } else { String::new() },
                def.text_for(role).unwrap_or("").to_string(),
            ]
        })
        .collect();

    let headers = ["ID", "Name", "Side", "Priority", "Hidden", "Label"];
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let tty = is_tty();
    let mut output = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    output.push_str(&bold_if_tty(header_line.join(" ").trim_end(), tty));
    output.push('\n');

    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        output.push_str(line.join(" ").trim_end());
        output.push('\n');
    }
    output
}

/// Reachable stages, one per line
pub fn format_next_stages<S: Subject>(engine: &StageEngine<S>) -> String {
    let next = engine.next_stages();
    if next.is_empty() {
        return "No further stages for role ".to_string() + engine.role().as_str() + "\n";
    }
    let mut output = String::new();
    for def in next.values() {
        output.push_str(&format_stage_line(def, engine.role()));
    }
    output
}

fn format_stage_line(def: &StageDefinition, role: &RoleContext) -> String {
    match def.text_for(role) {
        Some(text) => format!("  {:<4} {:<32} {}\n", def.id, def.name, text),
        None => format!("  {:<4} {}\n", def.id, def.name),
    }
}

/// Detailed view of one statement
pub fn format_statement_summary<S: Subject>(
    engine: &StageEngine<S>,
    statement: &Statement,
    group: &BankGroup,
) -> String {
    let catalog = engine.catalog();
    let state = engine.state();
    let mut output = String::new();

    let header = format!(
        "Statement {}: {}",
        statement.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
        statement.uuid
    );
    output.push_str(&bold_if_tty(&header, is_tty()));
    output.push('\n');
    output.push_str(&"=".repeat(header.len().max(60)));
    output.push_str("\n\n");

    output.push_str(&format!("Group:       {} ({})\n", group.name, group.variant));
    output.push_str(&format!("Role:        {}\n", engine.role()));
    output.push_str(&format!("Stage:       {}\n", describe_id(catalog, state.stage_id)));
    output.push_str(&format!("Sub-stage:   {}\n", describe_id(catalog, state.substage_id)));

    let label = engine.stage_name(false);
    let sub_label = engine.stage_name(true);
    output.push_str(&format!("Label:       {}\n", if label.is_empty() { "(none)" } else { label }));
    if !sub_label.is_empty() {
        output.push_str(&format!("Sub label:   {}\n", sub_label));
    }
    if let Some(current) = engine.current_stage() {
        output.push_str(&format!("Side:        {}\n", current.side));
    }
    output.push_str(&format!(
        "Scoring:     {}\n",
        if state.scoring_wait { "waiting" } else { "-" }
    ));
    if let Some(pending) = &state.pending_transition {
        output.push_str(&format!(
            "Pending:     {} / {}\n",
            describe_id(catalog, pending.stage_id),
            describe_id(catalog, pending.substage_id)
        ));
    }
    if engine.is_successful_finish_stage() {
        output.push_str("Finished:    yes\n");
    } else if engine.is_any_finish_stage() {
        output.push_str("Finished:    yes (unsuccessful)\n");
    }
    output.push_str(&format!("Created:     {}\n", format_timestamp(statement.created_ts)));
    output.push_str(&format!("Modified:    {}\n\n", format_timestamp(statement.modified_ts)));

    output.push_str("Next stages:\n");
    let next = engine.next_stages();
    if next.is_empty() {
        output.push_str("  (none)\n");
    } else {
        for def in next.values() {
            output.push_str(&format_stage_line(def, engine.role()));
        }
    }
    output
}

/// JSON view of one statement, for `show --json`
pub fn statement_json<S: Subject>(
    engine: &StageEngine<S>,
    statement: &Statement,
    group: &BankGroup,
) -> serde_json::Value {
    let state = engine.state();
    let next: Vec<serde_json::Value> = engine
        .next_stages()
        .values()
        .map(|def| serde_json::json!({ "id": def.id, "name": def.name }))
        .collect();

    serde_json::json!({
        "id": statement.id,
        "uuid": statement.uuid,
        "group": group.name,
        "variant": group.variant,
        "role": engine.role().as_str(),
        "stage_id": state.stage_id,
        "stage": engine.current_stage().map(|def| def.name.as_str()),
        "substage_id": state.substage_id,
        "substage": engine.current_sub_stage().map(|def| def.name.as_str()),
        "label": engine.stage_name(false),
        "substage_label": engine.stage_name(true),
        "scoring_wait": state.scoring_wait,
        "pending_transition": state.pending_transition,
        "next_stages": next,
    })
}
