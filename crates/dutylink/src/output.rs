use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dutylink_motor::{Duty, FadePlan, FadeStep};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct DutyOutput<'a> {
    kind: &'static str,
    node: &'a str,
    duty: Duty,
    timestamp: String,
}

/// Print a duty reported by a node.
pub fn print_duty(node: &str, duty: Duty, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DutyOutput {
                kind: "duty",
                node,
                duty,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NODE", "DUTY", "DIRECTION"])
                .add_row(vec![
                    node.to_string(),
                    duty.to_string(),
                    direction(duty).to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("node={node} duty={duty} ({})", direction(duty)),
        OutputFormat::Raw => println!("{duty}"),
    }
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    kind: &'static str,
    from: Duty,
    to: Duty,
    requested_ms: u32,
    effective_ms: u32,
    crossing: bool,
    total_ms: u64,
    steps: Vec<&'a FadeStep>,
}

/// Print the steps a transition would take.
pub fn print_plan(plan: &FadePlan, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PlanOutput {
                kind: "fade-plan",
                from: plan.from(),
                to: plan.to(),
                requested_ms: plan.requested_ms(),
                effective_ms: plan.effective_ms(),
                crossing: plan.is_crossing(),
                total_ms: plan.total_duration_ms(),
                steps: plan.steps().collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STEP", "CHANNEL", "LEVEL", "DURATION", "DUTY AFTER"]);
            for (index, step) in plan.steps().enumerate() {
                table.add_row(vec![
                    (index + 1).to_string(),
                    step.channel.to_string(),
                    format!("{} -> {}", step.from_level, step.to_level),
                    format!("{} ms", step.duration_ms),
                    step.settles_at.to_string(),
                ]);
            }
            println!("{table}");
            println!(
                "{} -> {}: requested {} ms, effective {} ms",
                plan.from(),
                plan.to(),
                plan.requested_ms(),
                plan.effective_ms()
            );
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "from={} to={} requested_ms={} effective_ms={}",
                plan.from(),
                plan.to(),
                plan.requested_ms(),
                plan.effective_ms()
            );
            for step in plan.steps() {
                println!(
                    "  {} {}->{} over {} ms (duty {})",
                    step.channel, step.from_level, step.to_level, step.duration_ms, step.settles_at
                );
            }
        }
    }
}

pub fn direction(duty: Duty) -> &'static str {
    match duty.percent() {
        0 => "stopped",
        p if p > 0 => "forward",
        _ => "reverse",
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
