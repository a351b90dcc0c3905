//! EmpleaBot 预配
//!
//! 只做 Assistant 收敛：按配置创建或更新远端 Assistant，打印标识与结果后退出。
//! 用法：empleabot-provision [config.toml]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use empleabot::api::HttpAssistantClient;
use empleabot::assistant::{ConvergeOutcome, Reconciler};
use empleabot::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    empleabot::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let desired = cfg
        .desired_assistant()
        .context("Invalid assistant configuration")?;
    let client = Arc::new(
        HttpAssistantClient::new(cfg.api_settings().context("Invalid API configuration")?)?,
    );

    let result = Reconciler::new(client)
        .converge(&desired, cfg.assistant_id().as_deref())
        .await
        .context("Assistant reconciliation failed")?;

    let outcome = match result.outcome {
        ConvergeOutcome::Created => "created",
        ConvergeOutcome::Updated => "updated",
        ConvergeOutcome::Unchanged => "unchanged",
    };
    println!("{} {}", result.assistant_id(), outcome);
    if result.outcome == ConvergeOutcome::Created {
        println!("export AZURE_OPENAI_ASSISTANT_ID={}", result.assistant_id());
    }
    Ok(())
}
