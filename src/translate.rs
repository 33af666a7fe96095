use tracing::warn;

use crate::backend::AiBackend;

pub fn translation_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following football match analysis to {language}. Keep the tone professional and astrological. Maintain the Markdown formatting.\n\n{text}"
    )
}

/// Translates an analysis; any failure falls back to the original text.
pub fn translate_analysis(backend: &dyn AiBackend, text: &str, language: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    match backend.generate(&translation_prompt(text, language)) {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => {
            warn!(%language, "translation came back empty, keeping original");
            text.to_string()
        }
        Err(err) => {
            warn!(%language, error = %err, "translation failed, keeping original");
            text.to_string()
        }
    }
}
