//! Per-client profile and coaching preferences.
//!
//! Both are submitted from loosely-typed forms, so deserialization is
//! forgiving: numbers are accepted where text is expected, and unknown
//! enumeration values fall back to the default variant.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Accept a string, number or bool and keep it as text. Empty strings become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept a bool, or the strings/numbers form posts use for checkboxes.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes")
        }
        _ => false,
    })
}

/// Accept any known variant; anything else, including `null` or a number,
/// becomes the default.
fn lenient_enum<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Physical profile and goals of the person being coached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    #[serde(deserialize_with = "lenient_string")]
    pub age: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub gender: Option<String>,
    /// Height in centimetres.
    #[serde(deserialize_with = "lenient_string")]
    pub height: Option<String>,
    /// Body weight in kilograms.
    #[serde(deserialize_with = "lenient_string")]
    pub weight: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub goal: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub activity: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub diet: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub medical: Option<String>,
}

impl UserProfile {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        [
            &self.age,
            &self.gender,
            &self.height,
            &self.weight,
            &self.goal,
            &self.activity,
            &self.diet,
            &self.medical,
        ]
        .iter()
        .all(|f| f.is_none())
    }
}

/// Tone the assistant takes with the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachingStyle {
    Professional,
    Casual,
    Strict,
    #[default]
    #[serde(other)]
    Motivational,
}

/// How long and thorough answers should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    Detailed,
    #[default]
    #[serde(other)]
    Moderate,
}

/// Client-side preferences. Only the style and detail level shape the prompt;
/// the rest are stored and echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachSettings {
    #[serde(deserialize_with = "lenient_enum")]
    pub coaching_style: CoachingStyle,
    #[serde(deserialize_with = "lenient_enum")]
    pub detail_level: DetailLevel,
    pub units: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub dark_mode: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub auto_speak: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub reminders: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub show_calories: bool,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            coaching_style: CoachingStyle::default(),
            detail_level: DetailLevel::default(),
            units: "metric".to_string(),
            dark_mode: false,
            auto_speak: false,
            reminders: false,
            show_calories: true,
        }
    }
}
