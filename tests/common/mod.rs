//! 集成测试共用：收敛好的 Assistant、最小 PDF 构造

#![allow(dead_code)]

use std::time::Duration;

use empleabot::assistant::{
    AssistantDescriptor, ConvergeOutcome, ReconciliationResult, RemoteAssistantHandle, ToolSpec,
};
use empleabot::config::SessionSettings;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub fn desired() -> AssistantDescriptor {
    AssistantDescriptor::new(
        "EmpleaBot",
        "Eres un asistente de empleo",
        "gpt-4",
        vec![ToolSpec::CodeInterpreter, ToolSpec::Retrieval],
    )
}

pub fn reconciled(id: &str) -> ReconciliationResult {
    ReconciliationResult {
        handle: RemoteAssistantHandle {
            id: id.to_string(),
            observed: desired(),
        },
        outcome: ConvergeOutcome::Unchanged,
    }
}

pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        stream_timeout: Duration::from_millis(300),
        tool_timeout: Duration::from_secs(1),
        ..SessionSettings::default()
    }
}

/// 每页一段文本的最小 PDF
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
