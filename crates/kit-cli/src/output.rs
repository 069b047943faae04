//! Human-readable rendering of plans and results

use colored::{ColoredString, Colorize};
use kit_core::{
    Action, ExecutionResult, Operation, OperationStatus, Plan, RunReport, Safety,
};
use serde_json::json;

use crate::error::Result;

fn action_marker(action: Action) -> ColoredString {
    match action {
        Action::Create => "+".green().bold(),
        Action::Update => "~".yellow().bold(),
        Action::Delete => "-".red().bold(),
    }
}

fn safety_tag(safety: Safety) -> String {
    match safety {
        Safety::Safe => String::new(),
        Safety::Caution => format!(" {}", "(caution)".yellow()),
        Safety::Dangerous => format!(" {}", "(dangerous)".red().bold()),
    }
}

fn operation_line(op: &Operation) -> String {
    let mut line = format!("  {} {}{}", action_marker(op.action), op.path, safety_tag(op.safety));
    if let Some(conflict) = op.conflict {
        line.push_str(&format!(
            " {} {}",
            "CONFLICT".red().bold(),
            conflict.description().dimmed()
        ));
    }
    line
}

pub fn print_plan(plan: &Plan) {
    println!(
        "{} {} -> {}",
        format!("{} plan:", plan.direction).bold(),
        plan.from_root.display().to_string().cyan(),
        plan.to_root.display().to_string().cyan()
    );

    if plan.is_empty() && plan.blocked.is_empty() {
        println!("  {}", "Already up to date".dimmed());
    }
    for op in &plan.operations {
        println!("{}", operation_line(op));
    }
    if !plan.blocked.is_empty() {
        println!("{}", "Blocked (needs --allow-critical):".red().bold());
        for op in &plan.blocked {
            println!("{}", operation_line(op));
        }
    }

    let summary = plan.summary;
    println!(
        "  {} create, {} update, {} delete, {} conflict (risk: {}, {} bytes)",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red(),
        summary.conflict.to_string().red(),
        plan.estimated_impact.risk_level,
        plan.estimated_impact.total_bytes
    );
    print_warnings(&plan.warnings);
}

pub fn print_result(result: &ExecutionResult) {
    for outcome in &result.operations {
        let path = &outcome.operation.path;
        match outcome.status {
            OperationStatus::Completed => {
                println!("  {} {} {}", "OK".green().bold(), outcome.operation.action, path);
            }
            OperationStatus::Failed => println!(
                "  {} {} {}: {}",
                "FAIL".red().bold(),
                outcome.operation.action,
                path,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            OperationStatus::Skipped => println!(
                "  {} {} ({})",
                "SKIP".yellow(),
                path,
                outcome.error.as_deref().unwrap_or("skipped")
            ),
        }
    }

    println!(
        "{} {} completed, {} failed, {} skipped",
        "=>".blue().bold(),
        result.count(OperationStatus::Completed),
        result.count(OperationStatus::Failed),
        result.count(OperationStatus::Skipped)
    );
    if let Some(backup) = &result.backup {
        println!(
            "{} Backup {} (undo with `kitsync rollback {}`)",
            "=>".blue().bold(),
            backup.id.cyan(),
            backup.id
        );
    }
    if result.cancelled {
        println!("{} Cancelled before all operations ran", "!".yellow().bold());
    }
    print_warnings(&result.warnings);
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
}

pub fn print_json(report: &RunReport) -> Result<()> {
    let output = json!({
        "plan": report.plan,
        "result": report.result,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
