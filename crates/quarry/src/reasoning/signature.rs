// crates/quarry/src/reasoning/signature.rs
// Field-marker prompt construction and output parsing for reasoning roles

use super::Fields;
use crate::llm::Message;
use regex::Regex;
use std::sync::LazyLock;

/// Marker wrapping each field: `[[ ## name ## ]]`
#[allow(clippy::expect_used)]
static FIELD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[\s*##\s*(\w+)\s*##\s*\]\]").expect("valid regex")
});

/// A fenced block covering the whole value: ```sql ... ```
#[allow(clippy::expect_used)]
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[\w-]*[ \t]*\n?(.*?)\n?```$").expect("valid regex")
});

const REASONING_FIELD: &str = "reasoning";
const COMPLETED_MARKER: &str = "completed";

/// One named field with a short description for the model
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub desc: &'static str,
}

/// Inputs, outputs and task instructions for one role
#[derive(Debug)]
pub struct Signature {
    pub instructions: &'static str,
    pub inputs: &'static [FieldSpec],
    pub outputs: &'static [FieldSpec],
}

pub static ROUTER: Signature = Signature {
    instructions: "Classify which knowledge source the question needs.",
    inputs: &[FieldSpec {
        name: "question",
        desc: "User question to classify",
    }],
    outputs: &[
        FieldSpec {
            name: REASONING_FIELD,
            desc: "Think step by step",
        },
        FieldSpec {
            name: "route",
            desc: "Route: 'rag' for policy/definitions, 'sql' for data queries, 'hybrid' for both",
        },
    ],
};

pub static PLANNER: Signature = Signature {
    instructions: "Extract date ranges, categories, KPI definitions and other constraints from the documents.",
    inputs: &[
        FieldSpec {
            name: "question",
            desc: "User question",
        },
        FieldSpec {
            name: "docs",
            desc: "Retrieved documents",
        },
    ],
    outputs: &[
        FieldSpec {
            name: REASONING_FIELD,
            desc: "Think step by step",
        },
        FieldSpec {
            name: "constraints",
            desc: "JSON constraints object",
        },
    ],
};

pub static QUERY_GEN: Signature = Signature {
    instructions: "Write a single SQLite query that answers the question using only the given schema.",
    inputs: &[
        FieldSpec {
            name: "question",
            desc: "Natural language question",
        },
        FieldSpec {
            name: "schema",
            desc: "Database schema",
        },
        FieldSpec {
            name: "constraints",
            desc: "Date/category constraints",
        },
    ],
    outputs: &[
        FieldSpec {
            name: REASONING_FIELD,
            desc: "Think step by step",
        },
        FieldSpec {
            name: "sql",
            desc: "Valid SQLite query",
        },
    ],
};

pub static SYNTHESIZER: Signature = Signature {
    instructions: "Answer the question from the data, matching the required format exactly.",
    inputs: &[
        FieldSpec {
            name: "question",
            desc: "Original question",
        },
        FieldSpec {
            name: "format_hint",
            desc: "Required format: int, float, list, dict",
        },
        FieldSpec {
            name: "data",
            desc: "SQL results or document content",
        },
    ],
    outputs: &[
        FieldSpec {
            name: REASONING_FIELD,
            desc: "Think step by step",
        },
        FieldSpec {
            name: "final_answer",
            desc: "Answer matching format_hint",
        },
        FieldSpec {
            name: "explanation",
            desc: "Brief explanation (at most 2 sentences)",
        },
        FieldSpec {
            name: "citations",
            desc: "JSON list of sources used",
        },
    ],
};

impl Signature {
    /// Output fields excluding the free-form reasoning scratchpad
    pub fn answer_fields(&self) -> Vec<&'static str> {
        self.outputs
            .iter()
            .map(|f| f.name)
            .filter(|name| *name != REASONING_FIELD)
            .collect()
    }

    fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|f| f.name == name)
    }

    pub fn build_system_prompt(&self) -> String {
        let mut prompt = String::from("Your input fields are:\n");
        for (i, field) in self.inputs.iter().enumerate() {
            prompt.push_str(&format!("{}. `{}`: {}\n", i + 1, field.name, field.desc));
        }
        prompt.push_str("Your output fields are:\n");
        for (i, field) in self.outputs.iter().enumerate() {
            prompt.push_str(&format!("{}. `{}`: {}\n", i + 1, field.name, field.desc));
        }

        prompt.push_str(
            "All interactions will be structured in the following way, with the appropriate values filled in.\n\n",
        );
        for field in self.inputs.iter().chain(self.outputs) {
            prompt.push_str(&format!("[[ ## {} ## ]]\n{{{}}}\n\n", field.name, field.name));
        }
        prompt.push_str(&format!("[[ ## {} ## ]]\n", COMPLETED_MARKER));
        prompt.push_str("In adhering to this structure, your objective is: ");
        prompt.push_str(self.instructions);
        prompt
    }

    pub fn build_user_prompt(&self, inputs: &Fields) -> String {
        let mut prompt = String::new();
        for field in self.inputs {
            let value = inputs.get(field.name).map(String::as_str).unwrap_or("");
            prompt.push_str(&format!("[[ ## {} ## ]]\n{}\n\n", field.name, value));
        }

        let order = self
            .outputs
            .iter()
            .map(|f| format!("`[[ ## {} ## ]]`", f.name))
            .collect::<Vec<_>>()
            .join(", then ");
        prompt.push_str(&format!(
            "Respond with the corresponding output fields, starting with the field {}, and then ending with the marker for `[[ ## {} ## ]]`.",
            order, COMPLETED_MARKER
        ));
        prompt
    }

    pub fn build_messages(&self, inputs: &Fields) -> Vec<Message> {
        vec![
            Message::system(self.build_system_prompt()),
            Message::user(self.build_user_prompt(inputs)),
        ]
    }
}

/// Strip a code fence that wraps the whole value
fn strip_code_fence(value: &str) -> String {
    let trimmed = value.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps
            .get(1)
            .map_or("", |m| m.as_str())
            .trim()
            .to_string(),
        None => trimmed.to_string(),
    }
}

/// Look for a `name: value` line when the model ignored the markers
fn find_labelled_line(text: &str, name: &str) -> Option<String> {
    let pattern = format!(r"(?im)^\s*\**{}\**\s*:\s*(.+)$", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse model output into the signature's output fields.
///
/// Fields the model did not produce are absent from the result.
pub fn parse_fields(signature: &Signature, text: &str) -> Fields {
    let mut fields = Fields::new();

    let markers: Vec<_> = FIELD_MARKER.captures_iter(text).collect();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if name == COMPLETED_MARKER || !signature.has_output(name) {
            continue;
        }
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let value = strip_code_fence(&text[whole.end()..end]);
        fields.entry(name.to_string()).or_insert(value);
    }

    let answer_fields = signature.answer_fields();
    for name in &answer_fields {
        if !fields.contains_key(*name)
            && let Some(value) = find_labelled_line(text, name)
        {
            fields.insert(name.to_string(), strip_code_fence(&value));
        }
    }

    // A bare reply to a single-output role is the answer itself
    if markers.is_empty()
        && answer_fields.len() == 1
        && !fields.contains_key(answer_fields[0])
        && !text.trim().is_empty()
    {
        fields.insert(answer_fields[0].to_string(), strip_code_fence(text));
    }

    fields
}
