use std::process::ExitCode;

use benchtrack::{Challenge, ScheduleEntry, Task, Track};
use serde_json::json;

use crate::commands::CommandResult;
use crate::commands::list::TrackSummary;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as human-readable text or a single JSON document and turns
/// the outcome into an exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::TrackList { tracks } => print_track_table(tracks),
        CommandResult::TrackInfo { plugin, track } => print_track(track, plugin.as_deref()),
        CommandResult::Prepared { track, report } => {
            if report.is_empty() {
                println!("Track '{track}' has no document archives to prepare.");
                return;
            }
            println!(
                "Prepared track '{track}' ({} groups, {} downloaded, {} decompressed)",
                report.groups.len(),
                report.downloads(),
                report.decompressions()
            );
            for group in &report.groups {
                let mut actions = Vec::new();
                if group.downloaded {
                    actions.push("downloaded");
                }
                if group.decompressed {
                    actions.push("decompressed");
                }
                let actions = if actions.is_empty() {
                    "up to date".to_string()
                } else {
                    actions.join(", ")
                };
                println!(
                    "  - {}/{}: {actions} (offsets: {})",
                    group.index,
                    group.group,
                    group.offset_index.display()
                );
            }
        }
    }
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    let payload = json!(result);
    println!("{payload}");
    Ok(())
}

fn print_track_table(tracks: &[TrackSummary]) {
    println!("Available tracks:\n");
    let rows: Vec<[String; 3]> = tracks
        .iter()
        .map(|t| [t.name.clone(), t.description.clone(), t.challenges.join(",")])
        .collect();
    let headers = ["Name", "Description", "Challenges"];
    let widths: Vec<usize> = (0..headers.len())
        .map(|col| {
            rows.iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(headers[col].len()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let line = |cells: [&str; 3]| {
        format!(
            "{:<w0$}  {:<w1$}  {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1]
        )
    };
    println!("{}", line(headers));
    println!(
        "{}",
        line([
            &"-".repeat(widths[0]),
            &"-".repeat(widths[1]),
            &"-".repeat(widths[2]),
        ])
    );
    for row in &rows {
        println!("{}", line([&row[0], &row[1], &row[2]]));
    }
}

fn print_track(track: &Track, plugin: Option<&str>) {
    println!("Track: {}", track.name);
    println!("  {}", track.description);
    println!("  Data: {}", track.source_root_url);
    if let Some(plugin) = plugin {
        println!("  Plugin: {plugin}");
    }

    println!("Indices ({}):", track.indices.len());
    for index in &track.indices {
        println!("  - {}", index.name);
        for group in &index.types {
            match &group.document_archive {
                Some(archive) => println!(
                    "      {}: {} documents from {}",
                    group.name,
                    group.number_of_documents,
                    archive.display()
                ),
                None => println!("      {}: no documents", group.name),
            }
        }
    }

    println!("Operations ({}):", track.operations.len());
    for operation in track.operations.values() {
        match &operation.param_source {
            Some(source) => println!(
                "  - {} ({}, param source: {source})",
                operation.name, operation.operation_type
            ),
            None => println!("  - {} ({})", operation.name, operation.operation_type),
        }
    }

    println!("Challenges ({}):", track.challenges.len());
    for challenge in &track.challenges {
        print_challenge(challenge);
    }
}

fn print_challenge(challenge: &Challenge) {
    println!("  - {}: {}", challenge.name, challenge.description);
    for (position, entry) in challenge.schedule.iter().enumerate() {
        match entry {
            ScheduleEntry::Task(task) => println!("      {}. {}", position + 1, describe(task)),
            ScheduleEntry::Parallel(block) => {
                match block.clients {
                    Some(clients) => println!("      {}. parallel ({clients} clients):", position + 1),
                    None => println!("      {}. parallel:", position + 1),
                }
                for task in &block.tasks {
                    println!("           - {}", describe(task));
                }
            }
        }
    }
}

fn describe(task: &Task) -> String {
    let mut parts = vec![
        format!("warmup {}", task.warmup_iterations),
        format!("iterations {}", task.iterations),
        format!("clients {}", task.clients),
    ];
    if let Some(period) = task.warmup_time_period {
        parts.push(format!("warmup period {period}s"));
    }
    if let Some(throughput) = task.target_throughput {
        parts.push(format!("target {throughput} ops/s"));
    }
    format!("{} [{}]", task.operation, parts.join(", "))
}
