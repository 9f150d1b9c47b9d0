//! Prompt assembly for the classification-and-draft call.
//!
//! One request carries the persona, knowledge base, condition rubric, the
//! five-field output contract, and the incoming email. Pure; never fails.

use serde_json::{json, Map, Value};

use crate::config::ReplyConfig;
use crate::llm::provider::{ChatMessage, CompletionRequest};
use crate::pipeline::types::IncomingEmail;

/// Low temperature keeps the JSON shape stable.
pub const REPLY_TEMPERATURE: f32 = 0.3;

/// Output budget per call.
pub const REPLY_MAX_TOKENS: u32 = 2048;

/// Value type of an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    String,
}

impl FieldKind {
    fn prose(self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::String => "string",
        }
    }

    fn schema_type(self) -> &'static str {
        match self {
            FieldKind::Boolean => "BOOLEAN",
            FieldKind::String => "STRING",
        }
    }
}

/// One field of the output contract.
#[derive(Debug, Clone, Copy)]
pub struct OutputField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

/// The output contract, in the order the model is asked to emit it.
pub const OUTPUT_FIELDS: [OutputField; 5] = [
    OutputField {
        name: "is_technical",
        kind: FieldKind::Boolean,
        description: "true if the email meets the condition to check, false otherwise.",
    },
    OutputField {
        name: "simple_reply_draft",
        kind: FieldKind::String,
        description: "Plain-language reply drawing on the knowledge base. Used when \
            is_technical is true and request_meeting is false, but must always be present.",
    },
    OutputField {
        name: "non_technical_reply_draft",
        kind: FieldKind::String,
        description: "Polite, professional acknowledgement with an offer to help. Used when \
            is_technical is false, but must always be present.",
    },
    OutputField {
        name: "request_meeting",
        kind: FieldKind::Boolean,
        description: "true if the tone suggests a serious project inquiry or pitch that \
            warrants a call, false otherwise.",
    },
    OutputField {
        name: "meeting_suggestion_draft",
        kind: FieldKind::String,
        description: "Reply proposing a call in the availability window from the knowledge \
            base. Only meaningful when request_meeting is true, but must always be present.",
    },
];

/// Human-readable contract for the prompt text.
pub fn schema_description() -> String {
    OUTPUT_FIELDS
        .iter()
        .map(|f| format!("- \"{}\" ({}): {}", f.name, f.kind.prose(), f.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Machine-enforced contract in the Gemini/OpenAPI schema dialect.
pub fn response_schema() -> Value {
    let mut properties = Map::new();
    for field in &OUTPUT_FIELDS {
        properties.insert(
            field.name.to_string(),
            json!({ "type": field.kind.schema_type(), "description": field.description }),
        );
    }
    let required: Vec<&str> = OUTPUT_FIELDS.iter().map(|f| f.name).collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

/// Builds the request for one email from the configured text blocks.
pub struct PromptBuilder<'a> {
    config: &'a ReplyConfig,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(config: &'a ReplyConfig) -> Self {
        Self { config }
    }

    /// Persona plus formatting and signature rules.
    pub fn system_instructions(&self) -> String {
        format!(
            "{persona}\n\n\
            FORMATTING RULES:\n\
            - Every draft (simple_reply_draft, non_technical_reply_draft, \
            meeting_suggestion_draft) MUST be plain text. Do not use HTML tags such as <br> or <b>.\n\
            - Every draft MUST end with this exact signature:\n{signature}",
            persona = self.config.persona,
            signature = self.config.signature,
        )
    }

    /// Knowledge base, task, contract and the email itself.
    pub fn user_prompt(&self, email: &IncomingEmail) -> String {
        format!(
            "**KNOWLEDGE BASE (for context and reply)**:\n{kb}\n\n\
            **TASK CONFIGURATION**:\n\
            CONDITION TO CHECK: {condition}\n\
            Output exactly one JSON object with the fields below. Do not include any other text.\n\n\
            **RESPONSE SCHEMA**:\n{schema}\n\n\
            --- INCOMING EMAIL ---\n\
            FROM: {from}\n\
            SUBJECT: {subject}\n\
            BODY:\n{body}\n\n\
            Generate the JSON object.",
            kb = self.config.knowledge_base,
            condition = self.config.condition,
            schema = schema_description(),
            from = email.sender_address,
            subject = email.subject,
            body = email.body,
        )
    }

    /// Full request. `enforce_schema` attaches the machine-readable schema.
    pub fn build(&self, email: &IncomingEmail, enforce_schema: bool) -> CompletionRequest {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.system_instructions()),
            ChatMessage::user(self.user_prompt(email)),
        ])
        .with_temperature(REPLY_TEMPERATURE)
        .with_max_tokens(REPLY_MAX_TOKENS);

        if enforce_schema {
            request.with_response_schema(response_schema())
        } else {
            request
        }
    }
}
