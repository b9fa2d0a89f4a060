use anyhow::Context;

use promoter_ci::{BuildTrigger, JenkinsTrigger};
use promoter_core::PromoterConfig;

pub async fn build(config: &PromoterConfig, job: &str, branch: &str, change_type: &str) -> anyhow::Result<()> {
    let ci = config.ci.as_ref().context("no [ci] section in config")?;
    let trigger = JenkinsTrigger::from_config(ci)?;

    let queued = trigger.start_build(job, branch, change_type).await?;
    match queued.queue_id {
        Some(id) => println!("✓ {} queued as item {id}", queued.job),
        None => println!("✓ {} queued", queued.job),
    }
    Ok(())
}
