//! Prompt text and response parsing for the LLM engine

use tracing::{debug, warn};

use crate::domain::{ArtifactBundle, OutputFile};

/// System prompt asking the model for a JSON artifact bundle
pub const SYSTEM_PROMPT: &str = r#"You are an autonomous task execution agent.
You receive a task from a project tracker and carry it out completely.

## Output Format
Respond ONLY with a valid JSON object, without markdown fences or preamble:
{
  "output_type": "markdown" | "code_folder" | "mixed",
  "summary": "Brief summary of what you did",
  "files": [
    {
      "path": "relative/path/to/file.ext",
      "content": "full file content",
      "description": "what this file is"
    }
  ],
  "notes": "Assumptions, caveats or follow-up suggestions"
}

## Rules
- Deliver complete work, never partial drafts
- For code: include tests, a README and a sensible project layout
- For writing: produce publication-ready text
- Record any assumptions in "notes"
- Always include real file content, not a description of what to write"#;

/// Wrap a task description in the user message sent to the model
pub fn user_message(task_description: &str) -> String {
    format!(
        "## Asana Task\n\n{}\n\nExecute this task completely. Return valid JSON as specified.",
        task_description
    )
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text;
    }
    // Drop the opening fence line (which may carry a language tag)
    let body = match text.split_once('\n') {
        Some((_, rest)) => rest,
        None => return "",
    };
    body.trim().trim_end_matches("```").trim()
}

/// Parse a model response into a bundle
///
/// Anything that is not a valid bundle is kept as a single raw markdown
/// file so the output is never lost.
pub fn parse_bundle(raw: &str) -> ArtifactBundle {
    debug!(len = raw.len(), "parse_bundle: called");
    match serde_json::from_str::<ArtifactBundle>(strip_fences(raw)) {
        Ok(bundle) => {
            debug!(files = bundle.files.len(), "parse_bundle: parsed");
            bundle
        }
        Err(e) => {
            warn!(error = %e, "Engine response was not a valid bundle, keeping raw text");
            ArtifactBundle {
                output_type: "markdown".to_string(),
                summary: "AI response (raw, JSON parsing failed)".to_string(),
                files: vec![OutputFile {
                    path: "output.md".to_string(),
                    content: raw.to_string(),
                    description: "Raw AI output".to_string(),
                }],
                notes: format!("JSON parse error: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r##"{"output_type":"code_folder","summary":"Built it","files":[
        {"path":"src/main.rs","content":"fn main() {}","description":"entry"},
        {"path":"README.md","content":"# Demo"}],"notes":""}"##;

    #[test]
    fn test_parse_plain_json() {
        let bundle = parse_bundle(BUNDLE);
        assert_eq!(bundle.output_type, "code_folder");
        assert_eq!(bundle.files.len(), 2);
        assert_eq!(bundle.files[1].description, "");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{}\n```", BUNDLE);
        let bundle = parse_bundle(&fenced);
        assert_eq!(bundle.summary, "Built it");
    }

    #[test]
    fn test_unparseable_response_becomes_single_raw_file() {
        let raw = "Sure! Here is what I did: nothing structured.";
        let bundle = parse_bundle(raw);
        assert_eq!(bundle.output_type, "markdown");
        assert_eq!(bundle.files.len(), 1);
        assert_eq!(bundle.files[0].path, "output.md");
        assert_eq!(bundle.files[0].content, raw);
        assert!(bundle.notes.starts_with("JSON parse error:"));
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("  {}  "), "{}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```"), "");
    }

    #[test]
    fn test_user_message_embeds_description() {
        let msg = user_message("# Task: X");
        assert!(msg.starts_with("## Asana Task\n\n# Task: X\n\n"));
    }
}
