use serde::{Deserialize, Serialize};
use std::fmt;

/// Advice for labels the table has no entry for.
pub const DEFAULT_ADVICE: &str =
    "Recuerda siempre cuidar tu bienestar emocional y buscar ayuda si es necesario.";

/// Shown instead of advice when a post has no text to analyse.
pub const EMPTY_CONTENT_MESSAGE: &str = "El contenido está vacío o no es un texto válido.";

/// Emotion labels produced by the classifier, plus the extra labels the
/// advice table covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Emotion {
    Anger,
    Sadness,
    Fear,
    Joy,
    Disgust,
    Trust,
    Anticipation,
    Surprise,
    Hope,
    Submission,
    Remorse,
    Contempt,
    Aggression,
    Love,
    Neutral,
    Other(String),
}

impl Emotion {
    pub fn as_str(&self) -> &str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Sadness => "sadness",
            Emotion::Fear => "fear",
            Emotion::Joy => "joy",
            Emotion::Disgust => "disgust",
            Emotion::Trust => "trust",
            Emotion::Anticipation => "anticipation",
            Emotion::Surprise => "surprise",
            Emotion::Hope => "hope",
            Emotion::Submission => "submission",
            Emotion::Remorse => "remorse",
            Emotion::Contempt => "contempt",
            Emotion::Aggression => "aggression",
            Emotion::Love => "love",
            Emotion::Neutral => "neutral",
            Emotion::Other(label) => label,
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Emotion::Anger => "Considera realizar ejercicios de relajación como la respiración profunda o dar un paseo para calmar tu mente.",
            Emotion::Sadness => "Podría ser útil hablar con un amigo cercano o profesional de salud mental para expresar lo que sientes.",
            Emotion::Fear => "Identifica qué te preocupa específicamente y da pequeños pasos para enfrentarlo. Considera hablar con alguien de confianza.",
            Emotion::Joy => "Es maravilloso sentir alegría. Comparte tu felicidad con otros o dedica tiempo a lo que te apasiona.",
            Emotion::Disgust => "Tómate un momento para reflexionar sobre lo que te provoca esta sensación y si es algo que puedas cambiar o evitar.",
            Emotion::Trust => "Valora las conexiones de confianza que tienes y sigue cultivando relaciones positivas en tu vida.",
            Emotion::Anticipation => "Planifica y prepárate para lo que viene, pero también recuerda vivir el presente sin dejar que la ansiedad te consuma.",
            Emotion::Surprise => "Las sorpresas pueden ser emocionantes o estresantes. Si es algo positivo, disfrútalo; si es negativo, busca adaptarte con calma.",
            Emotion::Hope => "Sigue adelante con esa actitud positiva, pero también es bueno prepararse para los retos que puedan surgir.",
            Emotion::Submission => "Si sientes que te estás sometiendo demasiado en una situación, reflexiona si es lo mejor para ti a largo plazo.",
            Emotion::Remorse => "Todos cometemos errores, lo importante es aprender de ellos y seguir adelante con una mentalidad de crecimiento.",
            Emotion::Contempt => "Reflexiona sobre lo que te provoca este desprecio y si es algo que se puede cambiar con un cambio de perspectiva.",
            Emotion::Aggression => "Si sientes impulsos agresivos, trata de canalizar esa energía en actividades físicas o creativas para liberar la tensión.",
            Emotion::Love => "El amor es un sentimiento hermoso. Aprovecha para fortalecer las relaciones que valoras y comparte tu cariño.",
            Emotion::Neutral | Emotion::Other(_) => DEFAULT_ADVICE,
        }
    }
}

/// Advice for a raw classifier label.
pub fn advice_for(label: &str) -> &'static str {
    Emotion::from(label).advice()
}

impl From<&str> for Emotion {
    fn from(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "anger" => Emotion::Anger,
            "sadness" => Emotion::Sadness,
            "fear" => Emotion::Fear,
            "joy" => Emotion::Joy,
            "disgust" => Emotion::Disgust,
            "trust" => Emotion::Trust,
            "anticipation" => Emotion::Anticipation,
            "surprise" => Emotion::Surprise,
            "hope" => Emotion::Hope,
            "submission" => Emotion::Submission,
            "remorse" => Emotion::Remorse,
            "contempt" => Emotion::Contempt,
            "aggression" => Emotion::Aggression,
            "love" => Emotion::Love,
            "neutral" => Emotion::Neutral,
            _ => Emotion::Other(normalized),
        }
    }
}

impl From<String> for Emotion {
    fn from(label: String) -> Self {
        Emotion::from(label.as_str())
    }
}

impl From<Emotion> for String {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
