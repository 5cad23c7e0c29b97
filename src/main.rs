//! Steward - 本地交互入口
//!
//! 从标准输入逐行读取用户话语并交给 Agent，打印回复与语音安全文本。
//! 命令：`/lang xx` 切换用户语言，`/user id` 切换用户，`/quit` 退出。
//! 用法：steward [config.toml]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use steward::agent::{create_executor, AgentEvent, RunOptions};
use steward::config::load_config;
use steward::tools::{EchoTool, ToolRegistry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    steward::observability::init();

    let cfg = load_config(std::env::args().nth(1).map(PathBuf::from))
        .context("Failed to load config")?;

    let mut registry = ToolRegistry::new(Duration::from_secs(cfg.tools.tool_timeout_secs));
    registry.register(EchoTool).context("Failed to register tools")?;
    let executor = create_executor(&cfg, registry);

    let mut language = cfg.agent.working_language.clone();
    let mut user_id = "local".to_string();
    println!("steward ready (user: {user_id}, language: {language}). /lang xx, /user id, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Some(lang) = line.strip_prefix("/lang ") {
            language = lang.trim().to_string();
            println!("language: {language}");
            continue;
        }
        if let Some(id) = line.strip_prefix("/user ") {
            user_id = id.trim().to_string();
            println!("user: {user_id}");
            continue;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                match ev {
                    AgentEvent::ToolCall { tool, args, .. } => println!("  -> {tool}({args})"),
                    AgentEvent::Observation { tool, success, preview } => {
                        println!("  <- {tool} [{}] {preview}", if success { "ok" } else { "failed" })
                    }
                    AgentEvent::SessionCleared => println!("  (session cleared)"),
                    _ => {}
                }
            }
        });

        let result = executor
            .run_with(line, &user_id, &language, RunOptions::default().with_events(tx))
            .await;
        let _ = printer.await;

        match result {
            Ok(r) => {
                println!("{}", r.response);
                if r.voice_safe_response != r.response {
                    println!("[voice] {}", r.voice_safe_response);
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}
