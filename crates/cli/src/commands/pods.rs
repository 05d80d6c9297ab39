//! Pod inspection commands

use anyhow::Result;
use eru_client::EruClient;

use crate::output::{print_value, OutputFormat};

pub async fn list(client: &EruClient, start: u64, limit: u64, _format: OutputFormat) -> Result<()> {
    let pods = client.list_pods(start, limit).await?;
    print_value(&pods);
    Ok(())
}

pub async fn get(client: &EruClient, name: &str, _format: OutputFormat) -> Result<()> {
    let pod = client.get_pod(name).await?;
    print_value(&pod);
    Ok(())
}

pub async fn hosts(
    client: &EruClient,
    name: &str,
    show_all: bool,
    _format: OutputFormat,
) -> Result<()> {
    let hosts = client.list_pod_hosts(name, 0, 20, show_all).await?;
    print_value(&hosts);
    Ok(())
}
