//! Scaling commands

use anyhow::Result;
use eru_client::{
    EruClient, EruError, RemovalResult, ScaleInOptions, ScaleOutOptions, ScaleOutReport,
    ScaleOutcome,
};
use tabled::Tabled;

use crate::output::{print_error, print_success, OutputFormat};

/// Row for the scale-out report table
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Entrypoint")]
    entrypoint: String,
    #[tabled(rename = "Env")]
    env: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

pub async fn out(
    client: &EruClient,
    app: &str,
    opts: ScaleOutOptions,
    format: OutputFormat,
) -> Result<()> {
    match client.scale_out(app, opts).await {
        Ok(report) => {
            print_report(&report, format)?;
            print_success(&format!(
                "Scaled {} across {} cohorts",
                app,
                report.len()
            ));
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            match err {
                EruError::ScaleLimit { report, .. } | EruError::ScaleAggregate { report, .. } => {
                    print_report(&report, format)?;
                    print_error(&message);
                    Err(anyhow::anyhow!(message))
                }
                other => Err(other.into()),
            }
        }
    }
}

pub async fn in_(
    client: &EruClient,
    app: &str,
    ncontainer: u64,
    opts: ScaleInOptions,
    format: OutputFormat,
) -> Result<()> {
    let result = client.scale_in(app, ncontainer, opts).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Table => print_removal(&result),
    }

    if !result.is_ok() {
        anyhow::bail!("server rejected removal: r={} {}", result.r, result.msg);
    }
    Ok(())
}

fn print_report(report: &[ScaleOutReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            if report.is_empty() {
                println!("No cohorts to scale");
                return Ok(());
            }

            let rows: Vec<ReportRow> = report
                .iter()
                .map(|entry| {
                    let (added, outcome) = match &entry.outcome {
                        ScaleOutcome::Deployed { added, result } => {
                            (added.to_string(), format!("deployed ({})", result.msg))
                        }
                        ScaleOutcome::AtCeiling { current, ceiling } => {
                            ("0".to_string(), format!("at ceiling {}/{}", current, ceiling))
                        }
                        ScaleOutcome::Failed { added, error } => {
                            (added.to_string(), format!("failed: {}", error))
                        }
                    };
                    ReportRow {
                        version: entry.cohort.version.clone(),
                        entrypoint: entry.cohort.entrypoint.clone(),
                        env: entry.cohort.env.clone(),
                        pod: entry.podname.clone(),
                        added,
                        outcome,
                    }
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }
    Ok(())
}

fn print_removal(result: &RemovalResult) {
    if result.is_ok() {
        print_success(&format!("Removal accepted: {}", result.msg));
    } else {
        print_error(&format!("Removal rejected: {}", result.msg));
    }
    if !result.tasks.is_empty() {
        println!("Tasks: {:?}", result.tasks);
    }
}
