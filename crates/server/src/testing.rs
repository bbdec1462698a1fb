use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use vaxline_core::domain::intent::IntentResult;
use vaxline_core::domain::message::SenderId;
use vaxline_core::errors::ResolverError;
use vaxline_core::ports::IntentResolver;

/// Resolver that answers from a fixed script keyed by message text.
pub struct ScriptedResolver {
    fallback: IntentResult,
    scripted: HashMap<String, IntentResult>,
    failure: Option<ResolverError>,
    panics: bool,
    sessions: Mutex<Vec<SenderId>>,
}

impl ScriptedResolver {
    pub fn default_text(text: &str) -> Self {
        Self {
            fallback: IntentResult::new("Default Fallback Intent", text),
            scripted: HashMap::new(),
            failure: None,
            panics: false,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ResolverError) -> Self {
        Self { failure: Some(error), ..Self::default_text("") }
    }

    pub fn panicking() -> Self {
        Self { panics: true, ..Self::default_text("") }
    }

    pub fn on(mut self, text: &str, intent: IntentResult) -> Self {
        self.scripted.insert(text.to_string(), intent);
        self
    }

    pub fn sessions(&self) -> Vec<SenderId> {
        self.sessions.lock().expect("sessions lock").clone()
    }
}

#[async_trait]
impl IntentResolver for ScriptedResolver {
    async fn resolve(&self, session: &SenderId, text: &str) -> Result<IntentResult, ResolverError> {
        self.sessions.lock().expect("sessions lock").push(session.clone());
        if self.panics {
            panic!("scripted resolver panic");
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.scripted.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
    }
}
