use anyhow::Result;
use consent_gate::cli::{actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action: Action = start()?;
    action.execute().await?;
    Ok(())
}
