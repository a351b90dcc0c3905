//! EmpleaBot 命令行
//!
//! 入口：初始化日志、加载配置、收敛远端 Assistant、打开会话，然后逐行读取 stdin：
//! 普通文本作为消息提交；/attach <path>、/detach、/suggest <n>、/quit 为命令。
//! 对话内容写到 stdout，日志写到 stderr。

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use empleabot::api::HttpAssistantClient;
use empleabot::assistant::{ConvergeOutcome, Reconciler};
use empleabot::config::load_config;
use empleabot::core::{spawn_session, Command, UiState};
use empleabot::memory::Role;
use empleabot::session::SUGGESTIONS;
use empleabot::tools::ToolExecutor;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    empleabot::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let api_settings = cfg.api_settings().context("Invalid API configuration")?;
    let desired = cfg
        .desired_assistant()
        .context("Invalid assistant configuration")?;
    let client = Arc::new(HttpAssistantClient::new(api_settings)?);

    let reconciled = Reconciler::new(client.clone())
        .converge(&desired, cfg.assistant_id().as_deref())
        .await
        .context("Assistant reconciliation failed")?;
    if reconciled.outcome == ConvergeOutcome::Created {
        tracing::info!(
            "Persist the new assistant with AZURE_OPENAI_ASSISTANT_ID={}",
            reconciled.assistant_id()
        );
    }

    let settings = cfg.session_settings();
    let executor = ToolExecutor::empty(settings.tool_timeout);
    let session = spawn_session(client, &reconciled, executor, settings)
        .await
        .context("Failed to open session")?;

    let printer = tokio::spawn(print_transcript(session.state()));

    println!("EmpleaBot listo. Comandos: /attach <ruta.pdf>, /detach, /suggest <n>, /quit");
    for (i, s) in SUGGESTIONS.iter().enumerate() {
        println!("  /suggest {}  {}", i + 1, s);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, tearing down session");
                session.cancel();
                break;
            }
            _ = session.closed() => {
                eprintln!("La sesión terminó; reinicia EmpleaBot para continuar.");
                break;
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            session.send(Command::Quit)?;
            break;
        };
        match parse_command(&line) {
            Some(Command::Quit) => {
                session.send(Command::Quit)?;
                break;
            }
            Some(cmd) => session.send(cmd)?,
            None => eprintln!("Unknown command: {}", line.trim()),
        }
    }

    session.join().await;
    printer.abort();
    Ok(())
}

/// 解析一行输入；无法识别的斜杠命令返回 None
fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Submit(line.to_string()));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "attach" if !arg.is_empty() => Some(Command::Attach {
            path: PathBuf::from(arg),
        }),
        "detach" => Some(Command::Detach),
        "suggest" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .map(|n| Command::Suggest(n - 1)),
        "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

/// 把 UiState 的增长部分写到 stdout
async fn print_transcript(mut rx: watch::Receiver<UiState>) {
    let mut printed = TranscriptCursor::default();
    let mut last_error: Option<String> = None;
    let mut last_attachment: Option<String> = None;
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        printed.render(&state);
        if state.error_message != last_error {
            if let Some(e) = &state.error_message {
                eprintln!("\n[error] {}", e);
            }
            last_error = state.error_message.clone();
        }
        if state.attachment != last_attachment && !state.processing_attachment {
            if let Some(name) = &state.attachment {
                println!("\n[adjunto] {}", name);
            }
            last_attachment = state.attachment.clone();
        }
    }
}

/// 已输出的消息数与最后一条消息已输出的内容
#[derive(Default)]
struct TranscriptCursor {
    messages: usize,
    last_text: String,
}

impl TranscriptCursor {
    fn render(&mut self, state: &UiState) {
        let mut out = std::io::stdout().lock();
        for (i, msg) in state.history.iter().enumerate() {
            if i + 1 < self.messages {
                continue;
            }
            if i + 1 == self.messages {
                // 正在增长的最后一条：只输出新增部分；注解改写过则整条重印
                match msg.text.strip_prefix(self.last_text.as_str()) {
                    Some(suffix) => {
                        let _ = write!(out, "{}", suffix);
                    }
                    None => {
                        let _ = write!(out, "\n{}", msg.text);
                    }
                }
            } else {
                if msg.role == Role::User {
                    // 用户输入已在终端回显
                    self.messages = i + 1;
                    self.last_text = msg.text.clone();
                    continue;
                }
                let label = match msg.role {
                    Role::Assistant => "EmpleaBot",
                    Role::Code => "code",
                    Role::User => "tú",
                };
                let _ = write!(out, "\n[{}] {}", label, msg.text);
            }
            self.messages = i + 1;
            self.last_text = msg.text.clone();
        }
        let _ = out.flush();
    }
}
