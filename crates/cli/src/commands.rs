//! One-shot subcommands. Each builds a coordinator from the configuration,
//! performs one operation, and prints the result.

use std::path::Path;

use planta_coordinator::{
    CoordinatorError, Operator, PowerState, Readings, StartupChecklist, CHECKLIST_ITEMS,
};
use serde::Serialize;

use crate::backend::SharedCoordinator;
use crate::OutputFormat;

/// Failure of a one-shot command, reported by `main`.
#[derive(Debug)]
pub(crate) enum CommandError {
    Usage(String),
    Coordinator(CoordinatorError),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Usage(msg) => write!(f, "error: {}", msg),
            CommandError::Coordinator(err) => write!(f, "error: {}", err),
        }
    }
}

impl From<CoordinatorError> for CommandError {
    fn from(err: CoordinatorError) -> Self {
        CommandError::Coordinator(err)
    }
}

type CommandResult = Result<(), CommandError>;

fn print_json<T: Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

// ── checklist ─────────────────────────────────────────────────────────────────

pub(crate) fn cmd_checklist(output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "items": CHECKLIST_ITEMS })),
        OutputFormat::Text => {
            for (i, item) in CHECKLIST_ITEMS.iter().enumerate() {
                println!("{:>2}. {}", i + 1, item);
            }
        }
    }
}

/// Read a checklist submission from a JSON file, or answer every item "Sí".
pub(crate) fn load_checklist(
    path: Option<&Path>,
    all_yes: bool,
    negative: &[String],
) -> Result<Option<StartupChecklist>, CommandError> {
    let base = match (path, all_yes) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                CommandError::Usage(format!("could not read '{}': {}", path.display(), e))
            })?;
            let parsed: StartupChecklist = serde_json::from_str(&content).map_err(|e| {
                CommandError::Usage(format!("invalid checklist in '{}': {}", path.display(), e))
            })?;
            Some(parsed)
        }
        (None, true) => Some(StartupChecklist::all_yes()),
        (None, false) => None,
    };
    let Some(mut checklist) = base else {
        return Ok(None);
    };
    for item in negative {
        if !CHECKLIST_ITEMS.contains(&item.as_str()) {
            return Err(CommandError::Usage(format!(
                "'{}' is not a checklist item (see `planta checklist`)",
                item
            )));
        }
        checklist = checklist.answer(item, planta_coordinator::checklist::NO);
    }
    Ok(Some(checklist))
}

// ── shift ─────────────────────────────────────────────────────────────────────

pub(crate) async fn cmd_shift_open(
    coordinator: &SharedCoordinator,
    operator: &Operator,
    output: OutputFormat,
) -> CommandResult {
    let shift = coordinator
        .shifts()
        .open_shift(&operator.id, &operator.name)
        .await?;
    match output {
        OutputFormat::Json => print_json(&shift),
        OutputFormat::Text => println!(
            "Shift {} opened by {} at {}",
            shift.id, shift.operator_name, shift.started_at
        ),
    }
    Ok(())
}

pub(crate) async fn cmd_shift_close(
    coordinator: &SharedCoordinator,
    shift_id: &str,
    operator: &Operator,
    output: OutputFormat,
) -> CommandResult {
    let shift = coordinator
        .shifts()
        .close_shift(shift_id, &operator.name)
        .await?;
    match output {
        OutputFormat::Json => print_json(&shift),
        OutputFormat::Text => println!(
            "Shift {} closed at {}",
            shift.id,
            shift.ended_at.as_deref().unwrap_or("?")
        ),
    }
    Ok(())
}

pub(crate) async fn cmd_shift_active(
    coordinator: &SharedCoordinator,
    output: OutputFormat,
) -> CommandResult {
    let active = coordinator.shifts().get_active_shift().await?;
    match (output, active) {
        (OutputFormat::Json, active) => print_json(&serde_json::json!({ "active": active })),
        (OutputFormat::Text, None) => println!("No active shift"),
        (OutputFormat::Text, Some(shift)) => println!(
            "Shift {} opened by {} at {}",
            shift.id, shift.operator_name, shift.started_at
        ),
    }
    Ok(())
}

// ── equipment ─────────────────────────────────────────────────────────────────

pub(crate) async fn cmd_equipment_list(
    coordinator: &SharedCoordinator,
    output: OutputFormat,
) -> CommandResult {
    let equipment = coordinator.equipment().list_equipment().await?;
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "equipment": equipment })),
        OutputFormat::Text => {
            if equipment.is_empty() {
                println!("No equipment registered");
            }
            for unit in &equipment {
                println!("{}\t{}", unit.id, unit.name);
            }
        }
    }
    Ok(())
}

pub(crate) async fn cmd_equipment_state(
    coordinator: &SharedCoordinator,
    equipment_id: &str,
    output: OutputFormat,
) -> CommandResult {
    coordinator.equipment().get_equipment(equipment_id).await?;
    let current = coordinator
        .equipment()
        .get_current_state(equipment_id)
        .await?;
    match (output, current) {
        (OutputFormat::Json, current) => print_json(&serde_json::json!({
            "equipment_id": equipment_id,
            "current": current,
        })),
        (OutputFormat::Text, None) => println!("{}: no state recorded", equipment_id),
        (OutputFormat::Text, Some(record)) => println!(
            "{}: {} since {} (by {})",
            equipment_id, record.state, record.recorded_at, record.operator_name
        ),
    }
    Ok(())
}

pub(crate) struct SetStateArgs<'a> {
    pub(crate) equipment_id: &'a str,
    pub(crate) state: PowerState,
    pub(crate) operator: &'a Operator,
    pub(crate) checklist: Option<StartupChecklist>,
    pub(crate) notes: Option<&'a str>,
}

pub(crate) async fn cmd_equipment_set(
    coordinator: &SharedCoordinator,
    args: SetStateArgs<'_>,
    output: OutputFormat,
    quiet: bool,
) -> CommandResult {
    let transition = coordinator
        .equipment()
        .set_state(
            args.equipment_id,
            args.state,
            args.operator,
            args.checklist.as_ref(),
            args.notes,
        )
        .await?;
    match output {
        OutputFormat::Json => print_json(&transition),
        OutputFormat::Text => {
            println!(
                "{} set to {} at {} (record {})",
                args.equipment_id,
                transition.record.state,
                transition.record.recorded_at,
                transition.record.id
            );
            if !quiet && !transition.negative_items.is_empty() {
                eprintln!(
                    "warning: checklist answered \"No\" for: {}",
                    transition.negative_items.join(", ")
                );
            }
        }
    }
    Ok(())
}

// ── monitoring ────────────────────────────────────────────────────────────────

pub(crate) async fn cmd_monitor_record(
    coordinator: &SharedCoordinator,
    equipment_id: &str,
    operator: &Operator,
    readings: Readings,
    output: OutputFormat,
) -> CommandResult {
    let outcome = coordinator
        .record_monitoring(operator, equipment_id, readings)
        .await?;
    match output {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            if let Some(closed) = &outcome.closed_previous {
                println!("Closed interval {}", closed.id);
            }
            println!(
                "Opened interval {} for {} at {}",
                outcome.opened.id, equipment_id, outcome.opened.recorded_at
            );
        }
    }
    Ok(())
}

pub(crate) async fn cmd_monitor_ledger(
    coordinator: &SharedCoordinator,
    equipment_id: &str,
    output: OutputFormat,
) -> CommandResult {
    let ledger = coordinator.monitoring().ledger(equipment_id).await?;
    let report = planta_coordinator::monitoring::check_continuity(equipment_id, &ledger);
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "intervals": ledger,
            "report": report,
        })),
        OutputFormat::Text => {
            for interval in &ledger {
                let end = interval
                    .final_readings
                    .map(|r| format!("{}", r.horometer))
                    .unwrap_or_else(|| "open".to_string());
                println!(
                    "{}\t{}\thorómetro {} -> {}",
                    interval.id, interval.recorded_at, interval.initial.horometer, end
                );
            }
            println!(
                "{} intervals, {} open, {} gaps",
                report.intervals,
                report.open_intervals,
                report.gaps.len()
            );
        }
    }
    Ok(())
}

// ── reconcile ─────────────────────────────────────────────────────────────────

/// Exits non-zero when unaudited startups exist.
pub(crate) async fn cmd_reconcile(
    coordinator: &SharedCoordinator,
    equipment_id: Option<&str>,
    output: OutputFormat,
) -> Result<bool, CommandError> {
    let unaudited = coordinator.find_unaudited_startups(equipment_id).await?;
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "unaudited": unaudited })),
        OutputFormat::Text => {
            if unaudited.is_empty() {
                println!("All startups have checklist records");
            }
            for record in &unaudited {
                println!(
                    "{}\t{}\t{}\tno checklist",
                    record.id, record.equipment_id, record.recorded_at
                );
            }
        }
    }
    Ok(unaudited.is_empty())
}
