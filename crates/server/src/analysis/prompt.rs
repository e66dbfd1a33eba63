use std::fmt::Write;

use shared_types::{Case, ChatRole, ChatTurn, Document};

/// Instruction sent with every case analysis. The reply must follow this schema.
pub const ANALYSIS_INSTRUCTION: &str = r#"Analyze this legal case and provide comprehensive analysis in JSON format:

{
  "schemaVersion": 1,
  "caseTypeClassification": "string - classify the case type",
  "keyLegalIssues": ["array of key legal issues"],
  "relevantStatutes": ["array of relevant statutes and sections"],
  "precedentCases": [
    {
      "name": "case name",
      "citation": "citation",
      "relevance": "how it's relevant",
      "summary": "brief summary"
    }
  ],
  "actionItems": ["array of immediate actions needed"],
  "urgencyLevel": "LOW|MEDIUM|HIGH|CRITICAL",
  "deadlineReminders": [
    {
      "task": "task description",
      "dueDate": "YYYY-MM-DD",
      "priority": "LOW|MEDIUM|HIGH|CRITICAL",
      "description": "details"
    }
  ],
  "caseSummary": "comprehensive case summary",
  "strengths": ["case strengths"],
  "weaknesses": ["case weaknesses"],
  "recommendations": ["strategic recommendations"]
}

Respond with the JSON object only."#;

const CHAT_INSTRUCTIONS: &str = "# Instructions
You are a legal AI assistant helping an advocate analyze this document.
Provide accurate, helpful responses based on the document content.
If information is not in the document, clearly state that.
Cite specific sections when possible.
";

/// The first `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Case metadata followed by each document's extracted text, capped at
/// `max_chars` characters.
pub fn case_context(case: &Case, documents: &[Document], max_chars: usize) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "# Case Information\n\
         Case Number: {}\n\
         Case Type: {}\n\
         Petitioner: {}\n\
         Respondent: {}\n\
         Status: {}\n\
         Filing Date: {}\n\n\
         # Documents\n",
        case.case_number.as_deref().unwrap_or(&case.efiling_number),
        case.case_type,
        case.petitioner_name,
        case.respondent_name,
        case.status,
        case.efiling_date,
    );

    for doc in documents {
        if out.len() >= max_chars {
            break;
        }
        let _ = write!(
            out,
            "\n# Document: {}\nCategory: {}\n{}\n---\n",
            doc.title,
            doc.category,
            doc.extracted_text.as_deref().unwrap_or_default(),
        );
    }

    let capped = truncate_chars(&out, max_chars).len();
    out.truncate(capped);
    out
}

/// Context for a question about one document.
pub fn chat_context(doc: &Document, case: &Case, max_chars: usize) -> String {
    format!(
        "# Document Information\n\
         Title: {}\n\
         Category: {}\n\
         Case: {}\n\
         Case Type: {}\n\n\
         # Document Content\n\
         {}\n\n\
         {}",
        doc.title,
        doc.category,
        case.case_number.as_deref().unwrap_or(&case.efiling_number),
        case.case_type,
        truncate_chars(doc.extracted_text.as_deref().unwrap_or_default(), max_chars),
        CHAT_INSTRUCTIONS,
    )
}

/// Earlier turns plus the new question as a Human/Assistant transcript,
/// ending with an open assistant turn.
pub fn chat_transcript(history: &[ChatTurn], message: &str) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(history.len() + 1);
    for (i, turn) in history.iter().enumerate() {
        let line = match turn.role {
            ChatRole::Assistant if i == 0 => {
                format!("Human: [Previous context]\n\nAssistant: {}", turn.content)
            }
            ChatRole::Assistant => format!("Assistant: {}", turn.content),
            ChatRole::User => format!("Human: {}", turn.content),
        };
        lines.push(line);
    }
    lines.push(format!("Human: {message}"));
    format!("{}\n\nAssistant:", lines.join("\n\n"))
}
