//! 会话端到端测试：Mock 后端驱动完整的 Run

mod common;

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use empleabot::api::{MockBackend, MockFeed};
    use empleabot::core::{spawn_session, AppError, Command, RunState, SessionSupervisor, UiState};
    use empleabot::memory::{Message, Role};
    use empleabot::session::SessionController;
    use empleabot::stream::{Annotation, RunEvent, ToolCall, ToolCallKind};
    use empleabot::tools::{Tool, ToolExecutor, ToolRegistry};
    use serde_json::Value;
    use tokio::sync::watch;

    use crate::common::{fast_settings, pdf_with_pages, reconciled};

    async fn controller(api: Arc<MockBackend>, executor: ToolExecutor) -> SessionController {
        SessionController::start(
            api,
            &reconciled("asst_1"),
            executor,
            fast_settings(),
            &SessionSupervisor::new(),
        )
        .await
        .unwrap()
    }

    struct CountingTool {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "counts invocations"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}={}", self.name, args["q"].as_str().unwrap_or("")))
        }
    }

    fn function_call(id: &str, name: &str, q: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            kind: ToolCallKind::Function,
            name: name.into(),
            input: format!(r#"{{"q":"{q}"}}"#),
        }
    }

    #[tokio::test]
    async fn test_annotation_rewrites_every_occurrence() {
        let api = Arc::new(MockBackend::new());
        api.push_feed(MockFeed::Events(vec![
            RunEvent::TextCreated,
            RunEvent::text("Descarga sandbox:/mnt/data/cv.docx o "),
            RunEvent::text("sandbox:/mnt/data/cv.docx"),
            RunEvent::TextDelta {
                value: None,
                annotations: vec![Annotation::FilePath {
                    text: "sandbox:/mnt/data/cv.docx".into(),
                    file_id: "file-9".into(),
                }],
            },
            RunEvent::RunCompleted,
        ]));
        let mut s = controller(api, ToolExecutor::empty(Duration::from_secs(1))).await;
        s.submit("mejora mi CV").await.unwrap();
        assert_eq!(
            s.transcript().last().unwrap().text,
            "Descarga /api/files/file-9 o /api/files/file-9"
        );
    }

    #[tokio::test]
    async fn test_two_tool_calls_one_batched_submission() {
        let api = Arc::new(MockBackend::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool { name: "salary", calls: calls.clone() });
        registry.register(CountingTool { name: "skills", calls: calls.clone() });

        api.push_feed(MockFeed::Events(vec![
            RunEvent::TextCreated,
            RunEvent::text("Consultando..."),
            RunEvent::RequiresAction {
                run_id: "run_7".into(),
                tool_calls: vec![
                    function_call("call_1", "salary", "rust"),
                    function_call("call_2", "skills", "backend"),
                ],
            },
        ]));
        api.push_feed(MockFeed::Events(vec![
            RunEvent::TextCreated,
            RunEvent::text("Listo"),
            RunEvent::RunCompleted,
        ]));

        let executor = ToolExecutor::new(Arc::new(registry), Duration::from_secs(1));
        let mut s = controller(api.clone(), executor).await;
        s.submit("¿cuánto cobra un dev?").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let submissions = api.tool_submissions();
        assert_eq!(submissions.len(), 1);
        let (run_id, outputs) = &submissions[0];
        assert_eq!(run_id, "run_7");
        assert_eq!(outputs.len(), 2);
        assert!(outputs
            .iter()
            .any(|o| o.tool_call_id == "call_1" && o.output == "salary=rust"));
        assert!(outputs
            .iter()
            .any(|o| o.tool_call_id == "call_2" && o.output == "skills=backend"));
        assert_eq!(s.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_failed_resolver_submits_nothing() {
        let api = Arc::new(MockBackend::new());
        api.push_feed(MockFeed::Events(vec![RunEvent::RequiresAction {
            run_id: "run_8".into(),
            tool_calls: vec![function_call("call_1", "unregistered", "x")],
        }]));
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), Duration::from_secs(1));
        let mut s = controller(api.clone(), executor).await;

        let err = s.submit("hola").await.unwrap_err();
        assert!(matches!(err, AppError::ToolResolution(_)));
        assert_eq!(api.calls().submit_tool_outputs, 0);
        assert!(s.input_enabled());
    }

    #[tokio::test]
    async fn test_code_interpreter_output_and_image() {
        let api = Arc::new(MockBackend::new());
        api.push_feed(MockFeed::Events(vec![
            RunEvent::ToolCallCreated { kind: ToolCallKind::CodeInterpreter },
            RunEvent::ToolCallDelta {
                kind: ToolCallKind::CodeInterpreter,
                input: Some("import matplotlib".into()),
            },
            RunEvent::ToolCallDelta {
                kind: ToolCallKind::CodeInterpreter,
                input: Some("\nplot()".into()),
            },
            RunEvent::TextCreated,
            RunEvent::text("Gráfico:"),
            RunEvent::ImageFileDone { file_id: "file-img".into() },
            RunEvent::RunCompleted,
        ]));
        let mut s = controller(api, ToolExecutor::empty(Duration::from_secs(1))).await;
        s.submit("grafica mis skills").await.unwrap();

        let messages = s.transcript().messages();
        assert_eq!(messages[1], Message::code("import matplotlib\nplot()"));
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].text, "Gráfico:\n![file-img](/api/files/file-img)\n");
    }

    #[tokio::test]
    async fn test_input_locked_while_streaming() {
        let api = Arc::new(MockBackend::new());
        api.push_feed(MockFeed::EventsThenStall(vec![
            RunEvent::TextCreated,
            RunEvent::text("pensando"),
        ]));
        let (tx, mut rx) = watch::channel(UiState::default());
        let mut s = controller(api, ToolExecutor::empty(Duration::from_secs(1)))
            .await
            .with_ui(tx);

        let observer = tokio::spawn(async move {
            let mut saw_locked_streaming = false;
            while rx.changed().await.is_ok() {
                let ui = rx.borrow_and_update().clone();
                if ui.phase == RunState::Streaming {
                    assert!(ui.input_locked);
                    saw_locked_streaming = true;
                }
                if saw_locked_streaming && !ui.input_locked {
                    return ui;
                }
            }
            panic!("session closed before input was re-enabled");
        });

        let err = s.submit("hola").await.unwrap_err();
        assert!(matches!(err, AppError::StreamProtocol(_)));
        let ui = observer.await.unwrap();
        assert_eq!(ui.phase, RunState::Idle);
        assert!(ui.error_message.is_some());
    }

    #[tokio::test]
    async fn test_attachment_via_actor_merged_once() {
        let api = Arc::new(MockBackend::new());
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&pdf_with_pages(&["Ada Lovelace", "Rust 2024"])).unwrap();
        let name = file
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();

        let handle = spawn_session(
            api.clone(),
            &reconciled("asst_1"),
            ToolExecutor::empty(Duration::from_secs(1)),
            fast_settings(),
        )
        .await
        .unwrap();
        let mut rx = handle.state();

        handle
            .send(Command::Attach { path: file.path().to_path_buf() })
            .unwrap();
        handle.send(Command::Submit("revisa".into())).unwrap();
        handle.send(Command::Submit("gracias".into())).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if rx.borrow_and_update().history.len() == 4 {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        handle.send(Command::Quit).unwrap();
        handle.join().await;

        let posted = api.posted_messages();
        assert_eq!(posted.len(), 2);
        assert_eq!(
            posted[0].1,
            format!("PDF Content from {name}:\nAda Lovelace\nRust 2024\n\nUser Query: revisa")
        );
        assert_eq!(posted[1].1, "gracias");
    }

    #[tokio::test]
    async fn test_non_pdf_attachment_rejected() {
        let api = Arc::new(MockBackend::new());
        let mut s = controller(api.clone(), ToolExecutor::empty(Duration::from_secs(1))).await;
        let err = s
            .attach_document(b"name,skill\nada,rust".to_vec(), "text/csv", "skills.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
        assert!(s.pending_attachment().is_none());

        s.submit("hola").await.unwrap();
        assert_eq!(api.posted_messages()[0].1, "hola");
    }
}
