/// Interactive yes/no and free-text prompts used by the form session and the
/// admin console. Terminal, HTTP, and scripted answers all plug in here.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
    /// `None` when the user dismisses the prompt.
    fn prompt(&self, message: &str) -> Option<String>;
}

/// Agrees to everything and types `phrase` whenever asked for text.
#[derive(Debug, Clone)]
pub struct AssumeYes {
    phrase: String,
}

impl AssumeYes {
    pub fn typing(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
        }
    }
}

impl Default for AssumeYes {
    fn default() -> Self {
        Self::typing(super::service::DELETE_ALL_PHRASE)
    }
}

impl Confirmer for AssumeYes {
    fn confirm(&self, _message: &str) -> bool {
        true
    }

    fn prompt(&self, _message: &str) -> Option<String> {
        Some(self.phrase.clone())
    }
}
