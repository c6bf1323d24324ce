//! Prompts for spoken tutoring answers

/// System prompt shared by all generation providers
pub const VOICE_TUTOR_PROMPT: &str = "\
You are a voice AI tutor for an educational video platform.

CRITICAL RULES FOR VOICE RESPONSES:
1. Keep responses CONCISE (2-4 sentences max) - users are listening, not reading
2. Use SIMPLE language - avoid complex terms unless explaining them
3. Be CONVERSATIONAL - use natural speech patterns (\"Let's see...\", \"So...\", \"Well...\")
4. Provide ACTIONABLE answers - users want quick, clear explanations
5. If the answer isn't in the context, say: \"I don't have that information in the current lesson.\"

When responding in Hebrew:
- Use natural Hebrew speech patterns
- Avoid overly formal language
- Keep sentences short and clear

Remember: Users are in voice mode for speed. Be helpful, clear, and brief.";

/// Build the user turn: retrieved context followed by the student's question
#[must_use]
pub fn user_message(question: &str, context: &str) -> String {
    format!(
        "Context from course transcripts:\n---\n{context}\n---\n\nStudent question: {question}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_layout() {
        let msg = user_message("What is chunking?", "Chunking splits text.");
        assert_eq!(
            msg,
            "Context from course transcripts:\n---\nChunking splits text.\n---\n\nStudent question: What is chunking?"
        );
    }

    #[test]
    fn test_empty_context_still_frames_question() {
        let msg = user_message("Why?", "");
        assert!(msg.contains("---\n\n---"));
        assert!(msg.ends_with("Student question: Why?"));
    }
}
