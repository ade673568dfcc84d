//! Prompt construction for the three model calls.
//!
//! Three builders, one per call type: classification, story generation,
//! and judgment. The generation prompt carries prompt-level guardrails
//! (age range, length, structure) in addition to the system prompt; the
//! judge prompt embeds the scoring rubric and the required JSON schema.

use crate::judgment::Classification;

/// System prompt for story generation calls.
pub const STORYTELLER_SYSTEM_PROMPT: &str = "\
You are a gentle and creative bedtime storyteller for children.

Your audience is children between the ages of 5 and 10.
Your stories must always be:
- Safe
- Calm
- Positive
- Easy to understand
- Emotionally warm

You must NEVER include:
- Violence
- Fear, horror, or threats
- Adult themes
- Death or serious injury
- Mean-spirited behavior without a positive resolution";

/// System prompt for judgment calls.
pub const JUDGE_SYSTEM_PROMPT: &str = "\
You are a careful and fair evaluator of bedtime stories written for children aged 5 to 10.

You care deeply about child safety, clarity, emotional warmth,
and whether the story follows the user's request.";

/// Builds the classification prompt for a story request.
#[must_use]
pub fn build_classification_prompt(user_request: &str) -> String {
    format!(
        "Analyze the following bedtime story request and extract high-level attributes.\n\
         \n\
         REQUEST:\n\
         \"{user_request}\"\n\
         \n\
         Return ONLY valid JSON with the following keys:\n\
         - theme (e.g., friendship, courage, kindness)\n\
         - tone (e.g., calm, playful, adventurous)\n\
         - genre (e.g., animals, fantasy, robots, everyday life)\n\
         \n\
         JSON only. No extra text."
    )
}

/// Builds the storyteller prompt.
///
/// The classification section is included only when classification
/// succeeded; missing attributes fall back to `"not specified"`. The
/// feedback section is included only on retry attempts, carrying the
/// judge's improvement feedback (or the caller's own feedback on the
/// first attempt).
#[must_use]
pub fn build_storyteller_prompt(
    user_request: &str,
    classification: Option<&Classification>,
    feedback: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Write a bedtime story based on the following request:\n\
         \n\
         \"{user_request}\"\n"
    );

    if let Some(classification) = classification {
        let not_specified = "not specified";
        prompt.push_str(&format!(
            "\n\
             Story context:\n\
             - Theme: {}\n\
             - Tone: {}\n\
             - Genre: {}\n",
            classification.theme.as_deref().unwrap_or(not_specified),
            classification.tone.as_deref().unwrap_or(not_specified),
            classification.genre.as_deref().unwrap_or(not_specified),
        ));
    }

    if let Some(feedback) = feedback {
        prompt.push_str(&format!(
            "\n\
             Please improve the story using the following feedback:\n\
             \"{feedback}\"\n"
        ));
    }

    prompt.push_str(
        "\n\
         STORY REQUIREMENTS (MUST FOLLOW ALL):\n\
         \n\
         - Target age: 5-10 years old\n\
         - Length: 400-600 words\n\
         - Tone: calming, kind, and reassuring\n\
         - Language: simple sentences and age-appropriate vocabulary\n\
         \n\
         STORY STRUCTURE:\n\
         1. A friendly beginning that introduces the main character(s)\n\
         2. A gentle problem or challenge (not scary)\n\
         3. A thoughtful resolution where the problem is solved\n\
         4. A happy ending\n\
         5. A clear moral or lesson suitable for children\n\
         \n\
         End the story on a comforting and positive note.",
    );

    prompt
}

/// Builds the judge prompt for a candidate story.
#[must_use]
pub fn build_judge_prompt(story: &str, user_request: &str) -> String {
    format!(
        "Evaluate the following bedtime story for a child aged 5-10.\n\
         \n\
         USER REQUEST:\n\
         \"{user_request}\"\n\
         \n\
         STORY:\n\
         \"\"\"\n\
         {story}\n\
         \"\"\"\n\
         \n\
         Your task is to evaluate the story across the dimensions listed below.\n\
         Score EACH dimension from 1 to 5 and briefly explain the reason.\n\
         \n\
         SCORING GUIDE:\n\
         1 = Very poor\n\
         2 = Poor\n\
         3 = Acceptable\n\
         4 = Good\n\
         5 = Excellent\n\
         \n\
         EVALUATION DIMENSIONS:\n\
         \n\
         1. AGE_APPROPRIATENESS\n\
         - No scary, violent, or disturbing content\n\
         - Simple, age-appropriate vocabulary\n\
         - Themes suitable for children aged 5-10\n\
         \n\
         2. STORY_STRUCTURE\n\
         - Clear beginning, middle, and end\n\
         - Gentle problem or challenge\n\
         - Clear and satisfying resolution\n\
         \n\
         3. ENGAGEMENT\n\
         - Interesting and likable characters\n\
         - Fun to read aloud\n\
         - Keeps a child's attention\n\
         \n\
         4. REQUEST_ALIGNMENT\n\
         - Matches what the user asked for\n\
         - Includes requested characters, setting, or theme\n\
         - Does not ignore key elements of the request\n\
         \n\
         OVERALL VERDICT RULE:\n\
         - PASS if ALL dimension scores are 3 or higher\n\
         - FAIL if ANY dimension score is below 3\n\
         \n\
         OUTPUT FORMAT RULES (VERY IMPORTANT):\n\
         - Return ONLY valid JSON\n\
         - Do NOT include markdown\n\
         - Do NOT include any text outside JSON\n\
         \n\
         JSON SCHEMA:\n\
         {{\n\
         \"scores\": {{\n\
           \"age_appropriateness\": {{\"score\": \"<integer 1-5>\", \"reason\": \"<short explanation>\"}},\n\
           \"story_structure\": {{\"score\": \"<integer 1-5>\", \"reason\": \"<short explanation>\"}},\n\
           \"engagement\": {{\"score\": \"<integer 1-5>\", \"reason\": \"<short explanation>\"}},\n\
           \"request_alignment\": {{\"score\": \"<integer 1-5>\", \"reason\": \"<short explanation>\"}}\n\
         }},\n\
         \"verdict\": \"PASS or FAIL\",\n\
         \"improvement_feedback\": \"<specific suggestions only if verdict is FAIL, otherwise empty string>\"\n\
         }}"
    )
}
