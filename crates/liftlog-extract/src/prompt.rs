//! Extraction instruction and prompt assembly.

/// System instruction for the extraction call.
pub const EXTRACTION_INSTRUCTION: &str = r#"Extract workouts from the user message.
Return ONLY a JSON array.
If no workout is found, return [].

FOR EACH workout, extract ONLY these fields:

- exercise_name
- exercise_type ("strength" or "cardio")
- weight (number or null)
- weight_unit ("kg" or "lbs" or null)
- reps (number or null)
- sets (number or null)
- duration (number or null)
- duration_unit ("minutes" or "hours" or null)
- distance (number or null)
- distance_unit ("km" or "miles" or null)
- calories (number or null)
- notes (string or null)

RULES:
- Do NOT infer distance or duration. Only include if clearly stated.
- Do NOT guess calories.
- Do NOT include fields not mentioned.
- Return a JSON ARRAY, even for one workout.
- No extra text.

Example:
"I benched 80kg for 5 reps, 3 sets"
→ [{"exercise_name":"bench press","exercise_type":"strength","weight":80,"weight_unit":"kg","reps":5,"sets":3}]"#;

/// User message for the chat-style call.
pub fn user_prompt(context: &str, text: &str) -> String {
    format!("{context}Extract workouts from this message:\n\n{text}")
}

/// Single prompt for the fallback completion call.
pub fn fallback_prompt(context: &str, text: &str) -> String {
    format!(
        "{EXTRACTION_INSTRUCTION}\n\n{}\n\nJSON array:",
        user_prompt(context, text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_layout() {
        assert_eq!(
            user_prompt("", "I ran 5km"),
            "Extract workouts from this message:\n\nI ran 5km"
        );
        let with_context = user_prompt("Recent conversation:\nuser: hi\n\n", "squats");
        assert!(with_context.starts_with("Recent conversation:\nuser: hi\n\nExtract"));
    }

    #[test]
    fn test_fallback_prompt_contains_instruction_and_text() {
        let prompt = fallback_prompt("", "Deadlifted 120kg");
        assert!(prompt.starts_with("Extract workouts from the user message."));
        assert!(prompt.contains("Deadlifted 120kg"));
        assert!(prompt.contains("bench press"));
    }
}
