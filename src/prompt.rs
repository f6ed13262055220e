//! Prompt assembly for the two agent tasks.
//!
//! Both tasks produce a [`GenerateRequest`]: a system instruction, ordered
//! content parts (lead text, then a header text part and the inline payload
//! for every knowledge-base file) and the JSON schema the answer must follow.
//! Assembly is pure; identical inputs give identical requests.

use serde_json::{json, Value};

use crate::models::{KnowledgeBaseEntry, RagSource, SourceKind};

/// One content part sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    /// File payload, base64 as ingested.
    InlineData { mime_type: String, data: String },
}

/// A fully assembled model request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: String,
    pub parts: Vec<Part>,
    /// Schema in the model's `responseSchema` dialect.
    pub response_schema: Value,
    pub search_grounding: bool,
}

/// Lead part of the extraction request.
pub const EXTRACTION_LEAD: &str =
    "Generate a list of stakeholders based on the attached KB folder documents.";

/// Build the support-query request.
pub fn assemble_query<E: AsRef<KnowledgeBaseEntry>>(
    country: &str,
    question: &str,
    entries: &[E],
    rag_sources: &[RagSource],
    search_grounding: bool,
) -> GenerateRequest {
    let kb_summary = entries
        .iter()
        .map(|e| {
            let e = e.as_ref();
            format!(
                "[FOLDER] {} ({} files available) - Path: {}",
                e.name,
                e.files.len(),
                e.source_path
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let rag_context = rag_sources
        .iter()
        .filter(|s| s.active)
        .map(|s| format!("- {}: {}", s.name, s.url))
        .collect::<Vec<_>>()
        .join("\n");

    let system_instruction = format!(
        r#"You are "Sitter", a world-class technical support agent for a complex SaaS organization.

CONTEXT:
1. LOCAL KNOWLEDGE BASE (Primary Source):
{kb_summary}

2. TRUSTED EXTERNAL RAG SOURCES (Secondary Source):
{rag_context}

INSTRUCTIONS:
- First, analyze the attached Local Knowledge Base files to answer the user's question.
- If the answer is incomplete or missing in local files, use web search to find up-to-date information, prioritizing the domains listed in "TRUSTED EXTERNAL RAG SOURCES".
- Answer specifically for the client in {country}.
- Always provide the answer in TWO languages as JSON: English in "answerEnglish" and Traditional Chinese in "answerChinese".
- If you use external information, ensure it matches the context of the RAG sources provided."#
    );

    let mut parts = vec![Part::Text(format!(
        "Client Country: {}\nClient Question: {}",
        country, question
    ))];
    push_file_parts(&mut parts, entries);

    GenerateRequest {
        system_instruction,
        parts,
        response_schema: query_schema(),
        search_grounding,
    }
}

/// Build the stakeholder-extraction request.
pub fn assemble_extraction<E: AsRef<KnowledgeBaseEntry>>(
    entries: &[E],
    search_grounding: bool,
) -> GenerateRequest {
    let kb_summary = entries
        .iter()
        .map(|e| {
            let e = e.as_ref();
            format!("[FOLDER] {} - {} files", e.name, e.files.len())
        })
        .collect::<Vec<_>>()
        .join("\n");

    let system_instruction = format!(
        r#"Analyze the provided Knowledge Base folder contents to identify stakeholders.

FOLDERS INDEX:
{kb_summary}

TASKS:
1. Read all attached documents within the folders thoroughly.
2. Identify names of people, departments, or partner entities mentioned in the documents.
3. Determine the "region" based on the content or filename.
4. Infer "department", "role", and a brief "detail" summary, in English.
5. IMPORTANT: Give the Traditional Chinese translation of department, role, and detail in "departmentChinese", "roleChinese", and "detailChinese". Do not mix both languages in one field.
6. Set "source" to "File: [Relative Path]" of the document the stakeholder was found in."#
    );

    let mut parts = vec![Part::Text(EXTRACTION_LEAD.to_string())];
    push_file_parts(&mut parts, entries);

    GenerateRequest {
        system_instruction,
        parts,
        response_schema: extraction_schema(),
        search_grounding,
    }
}

/// Header text part announcing one attached file.
pub fn file_header(name: &str, relative_path: &str) -> String {
    format!("\n--- FILE: {} ---\nLocation: {}\n", name, relative_path)
}

fn push_file_parts<E: AsRef<KnowledgeBaseEntry>>(parts: &mut Vec<Part>, entries: &[E]) {
    for entry in entries {
        let entry = entry.as_ref();
        // Only local folders carry inline files.
        if entry.kind != SourceKind::LocalFolder {
            continue;
        }
        for file in &entry.files {
            parts.push(Part::Text(file_header(&file.name, &file.relative_path)));
            parts.push(Part::InlineData {
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            });
        }
    }
}

pub fn query_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "answerEnglish": {
                "type": "STRING",
                "description": "The technical support answer in English."
            },
            "answerChinese": {
                "type": "STRING",
                "description": "The technical support answer in Traditional Chinese."
            }
        },
        "required": ["answerEnglish", "answerChinese"]
    })
}

pub fn extraction_schema() -> Value {
    let string = json!({ "type": "STRING" });
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": string.clone(),
                "region": string.clone(),
                "department": string.clone(),
                "departmentChinese": string.clone(),
                "role": string.clone(),
                "roleChinese": string.clone(),
                "detail": string.clone(),
                "detailChinese": string.clone(),
                "source": string.clone()
            },
            "required": ["name", "region"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngestedFile;

    fn entry() -> KnowledgeBaseEntry {
        KnowledgeBaseEntry {
            id: "kb-1".to_string(),
            name: "Support".to_string(),
            source_path: "local://Support".to_string(),
            kind: SourceKind::LocalFolder,
            files: vec![
                IngestedFile {
                    name: "faq.md".to_string(),
                    relative_path: "Support/faq.md".to_string(),
                    data: "IyBGQVE=".to_string(),
                    mime_type: "text/markdown".to_string(),
                },
                IngestedFile {
                    name: "org.pdf".to_string(),
                    relative_path: "Support/org.pdf".to_string(),
                    data: "JVBERg==".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
            ],
        }
    }

    fn rag(name: &str, active: bool) -> RagSource {
        RagSource {
            id: name.to_string(),
            name: name.to_string(),
            url: format!("https://{}.example", name.to_lowercase()),
            active,
        }
    }

    #[test]
    fn query_lists_entries_and_active_sources_only() {
        let req = assemble_query(
            "Taiwan",
            "Checkout fails",
            &[entry()],
            &[rag("Magento", true), rag("Legacy", false)],
            true,
        );

        assert!(req
            .system_instruction
            .contains("[FOLDER] Support (2 files available) - Path: local://Support"));
        assert!(req
            .system_instruction
            .contains("- Magento: https://magento.example"));
        assert!(!req.system_instruction.contains("Legacy"));
        assert!(req.system_instruction.contains("client in Taiwan"));
        assert!(req.search_grounding);
        assert_eq!(req.response_schema["required"], json!(["answerEnglish", "answerChinese"]));
    }

    #[test]
    fn parts_are_lead_then_header_payload_pairs() {
        let req = assemble_query("US", "Why?", &[entry()], &[], false);
        assert_eq!(req.parts.len(), 5);
        assert_eq!(
            req.parts[0],
            Part::Text("Client Country: US\nClient Question: Why?".to_string())
        );
        assert_eq!(
            req.parts[1],
            Part::Text("\n--- FILE: faq.md ---\nLocation: Support/faq.md\n".to_string())
        );
        assert_eq!(
            req.parts[2],
            Part::InlineData {
                mime_type: "text/markdown".to_string(),
                data: "IyBGQVE=".to_string(),
            }
        );
        assert!(matches!(req.parts[4], Part::InlineData { .. }));
    }

    #[test]
    fn extraction_request_shape() {
        let req = assemble_extraction(&[entry()], true);
        assert!(req
            .system_instruction
            .contains("[FOLDER] Support - 2 files"));
        assert_eq!(req.parts[0], Part::Text(EXTRACTION_LEAD.to_string()));
        assert_eq!(req.parts.len(), 5);
        assert_eq!(req.response_schema["type"], "ARRAY");
        assert_eq!(req.response_schema["items"]["required"], json!(["name", "region"]));
    }

    #[test]
    fn assembly_is_deterministic() {
        let entries = vec![std::sync::Arc::new(entry())];
        let a = assemble_query("US", "Q", &entries, &[rag("Magento", true)], true);
        let b = assemble_query("US", "Q", &entries, &[rag("Magento", true)], true);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_knowledge_base_sends_only_lead() {
        let entries: Vec<KnowledgeBaseEntry> = Vec::new();
        let req = assemble_extraction(&entries, false);
        assert_eq!(req.parts.len(), 1);
    }
}
