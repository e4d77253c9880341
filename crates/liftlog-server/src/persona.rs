//! Personalized system instruction for the coaching assistant.
//!
//! The instruction is assembled from sections: a base sentence, the coaching
//! style, the detail level, guidance on recognizing workout mentions, and the
//! user's profile.

use liftlog_types::{CoachSettings, CoachingStyle, DetailLevel, UserProfile};

const BASE: &str = "You are a helpful fitness and health assistant. ";

const WORKOUT_GUIDANCE: &str = "\nIMPORTANT: When users mention their workouts, acknowledge them and extract the workout data. \n\
Examples of workout mentions you should recognize:\n\
- \"I benched 80kg for 5 reps, 3 sets\"\n\
- \"Did 100kg squats today, 5x5\"\n\
- \"Ran 5km in 30 minutes\"\n\
- \"Deadlifted 120kg\"\n\
\n\
Always provide personalized recommendations based on the user's specific profile information below:\n\
\n\
USER PROFILE:\n";

const INSTRUCTIONS: &str = "\n\nINSTRUCTIONS:\n\
1. Always consider the user's specific profile when giving advice\n\
2. Provide personalized workout plans based on their goals and physical stats\n\
3. Suggest appropriate nutrition plans considering their dietary preferences\n\
4. Adjust exercise intensity based on their activity level\n\
5. Be mindful of any medical considerations\n\
6. Calculate calorie needs based on their age, weight, height, and activity level\n\
7. Provide age-appropriate fitness recommendations\n\
\n\
Use {knowledge} from the knowledge base to enhance your responses when relevant.";

const NO_PROFILE: &str = "No profile information available. Provide general fitness advice.";

const INCOMPLETE_PROFILE: &str =
    "No profile information available. Ask the user to complete their profile for personalized advice.";

pub fn coaching_style_text(style: CoachingStyle) -> &'static str {
    match style {
        CoachingStyle::Motivational => {
            "Be motivational and encouraging. Use positive reinforcement and inspiring language. Celebrate small victories and keep the user motivated."
        }
        CoachingStyle::Professional => {
            "Be professional and technical. Use precise fitness terminology and scientific explanations. Focus on proper form and evidence-based recommendations."
        }
        CoachingStyle::Casual => {
            "Be casual and friendly. Use conversational language and be approachable. Keep it light and relatable."
        }
        CoachingStyle::Strict => {
            "Be strict and disciplined. Use direct language and hold the user accountable. Emphasize consistency and hard work."
        }
    }
}

pub fn detail_level_text(level: DetailLevel) -> &'static str {
    match level {
        DetailLevel::Brief => {
            "Provide concise answers. Get straight to the point without unnecessary details. Keep responses under 100 words when possible."
        }
        DetailLevel::Moderate => {
            "Provide balanced answers with key details. Include important explanations but avoid excessive length. Aim for 100-200 words for complex topics."
        }
        DetailLevel::Detailed => {
            "Provide comprehensive, in-depth answers. Include detailed explanations, examples, and considerations. Don't worry about response length - prioritize completeness."
        }
    }
}

fn goal_label(goal: &str) -> &str {
    match goal {
        "lose-weight" => "Weight loss",
        "build-muscle" => "Muscle building",
        "improve-endurance" => "Improving endurance",
        "increase-flexibility" => "Increasing flexibility",
        "general-fitness" => "General fitness improvement",
        "sports-performance" => "Sports performance enhancement",
        other => other,
    }
}

fn activity_label(activity: &str) -> &str {
    match activity {
        "sedentary" => "Sedentary (little or no exercise)",
        "light" => "Light activity (1-3 days/week)",
        "moderate" => "Moderate activity (3-5 days/week)",
        "active" => "Active (6-7 days/week)",
        "very-active" => "Very active (2x per day)",
        other => other,
    }
}

fn diet_label(diet: &str) -> &str {
    match diet {
        "vegetarian" => "Vegetarian",
        "vegan" => "Vegan",
        "keto" => "Ketogenic",
        "paleo" => "Paleo",
        "gluten-free" => "Gluten-free",
        other => other,
    }
}

/// Bullet lines describing the profile. Empty when nothing usable is set.
fn profile_lines(profile: &UserProfile) -> Vec<String> {
    let mut lines = Vec::new();

    let basic: Vec<String> = [
        profile.age.as_ref().map(|a| format!("Age: {a} years")),
        profile.gender.as_ref().map(|g| format!("Gender: {g}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !basic.is_empty() {
        lines.push(format!(" • {}", basic.join(", ")));
    }

    let stats: Vec<String> = [
        profile.height.as_ref().map(|h| format!("Height: {h} cm")),
        profile.weight.as_ref().map(|w| format!("Weight: {w} kg")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !stats.is_empty() {
        lines.push(format!(" • {}", stats.join(", ")));
    }

    if let Some(goal) = &profile.goal {
        lines.push(format!(" • Fitness Goal: {}", goal_label(goal)));
    }
    if let Some(activity) = &profile.activity {
        lines.push(format!(" • Activity Level: {}", activity_label(activity)));
    }
    if let Some(diet) = profile.diet.as_deref().filter(|d| *d != "none") {
        lines.push(format!(" • Dietary Preference: {}", diet_label(diet)));
    }
    if let Some(medical) = profile.medical.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!(" • Medical Considerations: {medical}"));
    }

    lines
}

/// Build the system instruction for one client's chat turn.
pub fn build_system_prompt(settings: &CoachSettings, profile: &UserProfile) -> String {
    let mut prompt = String::from(BASE);
    prompt.push_str(coaching_style_text(settings.coaching_style));
    prompt.push(' ');
    prompt.push_str(detail_level_text(settings.detail_level));
    prompt.push(' ');
    prompt.push_str(WORKOUT_GUIDANCE);

    if profile.is_empty() {
        prompt.push_str(NO_PROFILE);
        return prompt;
    }

    let lines = profile_lines(profile);
    if lines.is_empty() {
        prompt.push_str(INCOMPLETE_PROFILE);
    } else {
        prompt.push_str(&lines.join("\n"));
        prompt.push_str(INSTRUCTIONS);
    }
    prompt
}
