// Built-in prompt library, registered once at startup.
// Every generation prompt in the service is defined here; callers refer to them by id.

use crate::prompts::PromptTemplate;

pub const JD_PARSE: &str = "jd_parse";
pub const BULLET_REWRITE: &str = "bullet_rewrite";
pub const RESUME_SCORE: &str = "resume_score";
pub const SUMMARY_TAILOR: &str = "summary_tailor";

/// System prompt applied to structured requests that carry no system prompt of their own.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction prepended to prompts that write resume content.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim you generate must be traceable to a specific context line \
    provided below. Do NOT infer, interpolate, or invent details. \
    If the context does not support a claim, omit it entirely.";

/// Instruction to avoid contribution type inflation.
pub const SCOPE_INSTRUCTION: &str = "\
    CRITICAL: Map contribution_type to language precisely: \
    - sole_author / primary_contributor: may use 'Architected', 'Designed', 'Built', 'Led' \
    - team_member: must use 'Contributed to', 'Collaborated on', 'Implemented (as part of team)' \
    - reviewer: must use 'Reviewed', 'Evaluated', 'Assessed' \
    NEVER upgrade a team_member to solo language. This is a hard rule.";

/// Variables: `jd_text`.
const JD_PARSE_BODY: &str = r#"Parse the following job description and extract structured information.

Return a JSON object with this EXACT schema (no extra fields):
{
  "hard_requirements": [
    {"text": "5+ years Rust programming", "is_required": true}
  ],
  "soft_signals": [
    "Kubernetes experience a plus"
  ],
  "role_signals": {
    "is_startup": false,
    "is_ic_focused": true,
    "is_research": false,
    "seniority": "senior"
  },
  "keyword_inventory": [
    {"keyword": "Rust", "frequency": 5, "position_weight": 0.8, "weighted_score": 4.0}
  ],
  "detected_tone": "CollaborativeEnterprise"
}

POSITION WEIGHTS for keyword scoring:
- Title / header: 1.0
- Requirements section: 0.8
- Responsibilities section: 0.6
- About Us / company section: 0.3
weighted_score = frequency * position_weight

TONE OPTIONS (pick exactly one): "AggressiveStartup", "CollaborativeEnterprise",
"ResearchOriented", "ProductOriented".

SENIORITY: "junior", "mid", "senior", "staff", "principal", "director", or "unknown".

JOB DESCRIPTION:
{{jd_text}}"#;

/// Variables: `bullet`, `role`, `tone`.
const BULLET_REWRITE_BODY: &str = r#"Rewrite the resume bullet below for a {{role}} application.

Target tone: {{tone}}

Original bullet:
{{bullet}}

Return a JSON object:
{
  "text": "Rewritten bullet, one line, starting with a strong verb",
  "changes": ["short description of each change"],
  "line_estimate": 1
}

HARD RULES:
1. Keep every fact and metric from the original; add none
2. `line_estimate` must be 1 or 2
3. Do NOT upgrade team contributions to sole ownership"#;

/// Variables: `resume_text`, `jd_text`.
const RESUME_SCORE_BODY: &str = r#"Score how well this resume fits the job description.

RESUME:
{{resume_text}}

JOB DESCRIPTION:
{{jd_text}}

Return a JSON object:
{
  "overall_score": 72,
  "strong_matches": [{"dimension": "Rust", "evidence": "3 years building services in Rust"}],
  "gaps": [{"keyword": "Kafka", "suggestion": "mention the event pipeline project if it used Kafka"}],
  "recommendation": "One or two sentences"
}

`overall_score` is an integer from 0 to 100. Only cite evidence present in the resume."#;

/// Variables: `context` (ranked, tagged context lines), `jd_summary`.
const SUMMARY_TAILOR_BODY: &str = r#"RANKED CONTEXT (most relevant first; only use facts from these lines):
{{context}}

TARGET ROLE:
{{jd_summary}}

Write a three-sentence professional summary for this candidate, tailored to the target role.
Plain text only, no headings, no bullet points."#;

pub fn builtin_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate::new(JD_PARSE, "Job description parser", "2.1", JD_PARSE_BODY),
        PromptTemplate::new(
            BULLET_REWRITE,
            "Resume bullet rewrite",
            "1.3",
            BULLET_REWRITE_BODY,
        ),
        PromptTemplate::new(RESUME_SCORE, "Resume fit score", "1.0", RESUME_SCORE_BODY),
        PromptTemplate::new(
            SUMMARY_TAILOR,
            "Tailored summary",
            "1.1",
            [
                GROUNDING_INSTRUCTION,
                "\n\n",
                SCOPE_INSTRUCTION,
                "\n\n",
                SUMMARY_TAILOR_BODY,
            ]
            .concat(),
        ),
    ]
}
