//! Application inspection commands

use anyhow::Result;
use eru_client::EruClient;
use tabled::Tabled;

use crate::output::{
    color_container_state, format_timestamp, print_value, print_warning, truncate_id, OutputFormat,
};

/// Row for the containers table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Entrypoint")]
    entrypoint: String,
    #[tabled(rename = "Env")]
    env: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "State")]
    state: String,
}

pub async fn list(client: &EruClient, start: u64, limit: u64, _format: OutputFormat) -> Result<()> {
    let apps = client.list_apps(start, limit).await?;
    print_value(&apps);
    Ok(())
}

pub async fn get(client: &EruClient, name: &str, _format: OutputFormat) -> Result<()> {
    let app = client.get_app(name).await?;
    print_value(&app);
    Ok(())
}

/// List an app's containers, as a table by default
pub async fn containers(
    client: &EruClient,
    name: &str,
    start: u64,
    limit: u64,
    format: OutputFormat,
) -> Result<()> {
    let containers = client.list_app_containers(name, start, limit).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&containers)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if containers.is_empty() {
                print_warning("No containers found");
                return Ok(());
            }

            let rows: Vec<ContainerRow> = containers
                .iter()
                .map(|c| ContainerRow {
                    id: truncate_id(&c.container_id),
                    version: c.version.clone(),
                    entrypoint: c.entrypoint.clone(),
                    env: c.env.clone(),
                    pod: c.podname.clone(),
                    created: format_timestamp(&c.created),
                    state: color_container_state(c.in_removal),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} containers", containers.len());
        }
    }

    Ok(())
}

pub async fn env_names(client: &EruClient, name: &str, _format: OutputFormat) -> Result<()> {
    let names = client.list_app_env_names(name).await?;
    print_value(&names);
    Ok(())
}

pub async fn env_content(
    client: &EruClient,
    name: &str,
    env: &str,
    _format: OutputFormat,
) -> Result<()> {
    let content = client.list_app_env_content(name, env).await?;
    print_value(&content);
    Ok(())
}
