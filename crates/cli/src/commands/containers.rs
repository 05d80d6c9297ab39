//! Container lifecycle commands

use anyhow::Result;
use eru_client::EruClient;

use crate::output::{print_success, print_value, OutputFormat};
use crate::ContainerCommands;

pub async fn run(
    client: &EruClient,
    command: ContainerCommands,
    _format: OutputFormat,
) -> Result<()> {
    match command {
        ContainerCommands::Get { id } => {
            let container = client.get_container(&id).await?;
            print_value(&container);
        }
        ContainerCommands::Start { id } => {
            client.start_container(&id).await?;
            print_success(&format!("Container {} started", id));
        }
        ContainerCommands::Stop { id } => {
            client.stop_container(&id).await?;
            print_success(&format!("Container {} stopped", id));
        }
        ContainerCommands::Kill { id } => {
            client.kill_container(&id).await?;
            print_success(&format!("Container {} marked dead", id));
        }
        ContainerCommands::Poll { id } => {
            let status = client.poll_container(&id).await?;
            print_value(&status);
        }
        ContainerCommands::Remove { ids } => {
            let result = client.remove_containers(&ids).await?;
            if result.is_ok() {
                print_success(&format!("Removal of {} containers accepted", ids.len()));
            } else {
                anyhow::bail!("server rejected removal: r={} {}", result.r, result.msg);
            }
        }
    }

    Ok(())
}
