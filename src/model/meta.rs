use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The modality a user picks before picking a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[serde(alias = "Text")]
    Text,
    #[serde(alias = "Image")]
    Image,
    #[serde(alias = "Audio")]
    Audio,
}

impl InputType {
    pub const ALL: [InputType; 3] = [InputType::Text, InputType::Image, InputType::Audio];

    /// Categories whose models accept this kind of input.
    pub fn categories(self) -> &'static [ModelCategory] {
        match self {
            InputType::Text => &[ModelCategory::TextSentiment],
            InputType::Image => &[ModelCategory::ImageClassification],
            InputType::Audio => &[ModelCategory::SpeechRecognition],
        }
    }

    /// Rejects submissions with nothing to run on.
    pub fn validate(self, data: &str) -> Result<()> {
        if !data.trim().is_empty() {
            return Ok(());
        }
        let message = match self {
            InputType::Text => "Please type some text.",
            InputType::Image | InputType::Audio => "Please choose a file.",
        };
        Err(Error::InvalidInput(message.to_string()))
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputType::Text => "Text",
            InputType::Image => "Image",
            InputType::Audio => "Audio",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelCategory {
    TextSentiment,
    ImageClassification,
    SpeechRecognition,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 3] = [
        ModelCategory::TextSentiment,
        ModelCategory::ImageClassification,
        ModelCategory::SpeechRecognition,
    ];

    pub fn input_type(self) -> InputType {
        match self {
            ModelCategory::TextSentiment => InputType::Text,
            ModelCategory::ImageClassification => InputType::Image,
            ModelCategory::SpeechRecognition => InputType::Audio,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelCategory::TextSentiment => "text-sentiment",
            ModelCategory::ImageClassification => "image-classification",
            ModelCategory::SpeechRecognition => "speech-recognition",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelCategory::TextSentiment => "Text: Sentiment Analysis",
            ModelCategory::ImageClassification => "Image: Classification",
            ModelCategory::SpeechRecognition => "Audio: Speech Recognition",
        }
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelCategory {
    type Err = Error;

    /// Accepts the kebab-case id or the display label. Anything else has no
    /// handler behind it.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        ModelCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::ConfigError(format!("Unsupported category: {}", s)))
    }
}

/// One selectable model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMeta {
    pub human_name: String,
    pub task: String,
    pub model_id: String,
    pub category: ModelCategory,
    pub description: String,
}

impl ModelMeta {
    pub fn new(
        human_name: impl Into<String>,
        task: impl Into<String>,
        model_id: impl Into<String>,
        category: ModelCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            human_name: human_name.into(),
            task: task.into(),
            model_id: model_id.into(),
            category,
            description: description.into(),
        }
    }

    pub fn input_type(&self) -> InputType {
        self.category.input_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_maps_one_to_one_onto_input_type() {
        for input_type in InputType::ALL {
            let cats = input_type.categories();
            assert_eq!(cats.len(), 1);
            assert_eq!(cats[0].input_type(), input_type);
        }
    }

    #[test]
    fn validate_rejects_blank_data() {
        assert!(InputType::Text.validate("hello").is_ok());
        assert!(InputType::Audio.validate("clip.wav").is_ok());

        let err = InputType::Text.validate("  \n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Please type some text.");
        for input_type in [InputType::Image, InputType::Audio] {
            let err = input_type.validate("").unwrap_err();
            assert_eq!(err.to_string(), "Invalid input: Please choose a file.");
        }
    }

    #[test]
    fn parse_category_by_id_and_label() {
        assert_eq!(
            "speech-recognition".parse::<ModelCategory>().unwrap(),
            ModelCategory::SpeechRecognition
        );
        assert_eq!(
            "Image: Classification".parse::<ModelCategory>().unwrap(),
            ModelCategory::ImageClassification
        );
    }

    #[test]
    fn parse_unknown_category_is_config_error() {
        let err = "video-captioning".parse::<ModelCategory>().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("Unsupported category: video-captioning"));
    }

    #[test]
    fn input_type_accepts_display_casing() {
        let parsed: InputType = serde_json::from_str("\"Image\"").unwrap();
        assert_eq!(parsed, InputType::Image);
        let parsed: InputType = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(parsed, InputType::Audio);
    }
}
