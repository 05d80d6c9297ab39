//! Log tailing commands

use anyhow::Result;
use eru_client::{EruClient, LogLine};

pub async fn container(
    client: &EruClient,
    id: &str,
    stdout: bool,
    stderr: bool,
    tail: u64,
) -> Result<()> {
    let mut stream = client.container_log(id, stdout, stderr, tail).await?;
    drain(&mut stream).await
}

pub async fn build(client: &EruClient, task_id: u64) -> Result<()> {
    let mut stream = client.build_log(task_id).await?;
    drain(&mut stream).await
}

/// Print lines until the server closes the socket.
async fn drain(stream: &mut eru_client::LogStream) -> Result<()> {
    while let Some(line) = stream.next().await {
        match line? {
            LogLine::Text(text) => println!("{}", text),
            LogLine::Json(value) => println!("{}", value),
        }
    }
    Ok(())
}
