//! Prompt assembly for the Switchboard agent.
//!
//! [`PromptComposer`] collects titled prompt sections in the order they are
//! added and renders them as Markdown. [`PromptComposer::compose`] pairs the
//! rendered prompt with the capability manifest and remote handoff
//! documents from a registry, producing the [`AgentDocument`] served to the
//! voice platform.

use serde::Serialize;
use serde_json::Value;
use switchboard_capabilities::{CapabilityRegistry, ManifestEntry};

/// One titled block of the system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptSection {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bullets: Vec<String>,
}

impl PromptSection {
    fn render_into(&self, out: &mut String) {
        out.push_str("## ");
        out.push_str(self.title.trim());
        out.push('\n');
        if let Some(body) = self.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            out.push('\n');
            out.push_str(body);
            out.push('\n');
        }
        if !self.bullets.is_empty() {
            out.push('\n');
            for bullet in &self.bullets {
                out.push_str("- ");
                out.push_str(bullet.trim());
                out.push('\n');
            }
        }
    }
}

/// The prompt, manifest, and handoff documents for one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDocument {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_prompt: Option<String>,
    pub functions: Vec<ManifestEntry>,
    pub remote_functions: Vec<Value>,
}

/// Ordered prompt sections plus the end-of-call instruction.
///
/// Sections are never merged or deduplicated: adding the same title twice
/// yields two sections.
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    sections: Vec<PromptSection>,
    post_prompt: Option<String>,
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_section(&mut self, title: impl Into<String>, body: impl Into<String>) -> &mut Self {
        self.push(title.into(), Some(body.into()), Vec::new())
    }

    pub fn add_bullets<I, S>(&mut self, title: impl Into<String>, bullets: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(title.into(), None, bullets.into_iter().map(Into::into).collect())
    }

    /// A section with an introductory body followed by bullets.
    pub fn add_section_with_bullets<I, S>(
        &mut self,
        title: impl Into<String>,
        body: impl Into<String>,
        bullets: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(
            title.into(),
            Some(body.into()),
            bullets.into_iter().map(Into::into).collect(),
        )
    }

    /// Sets the instruction the platform runs when the call ends to produce
    /// the call summary.
    pub fn set_post_prompt(&mut self, text: impl Into<String>) -> &mut Self {
        self.post_prompt = Some(text.into());
        self
    }

    pub fn sections(&self) -> &[PromptSection] {
        &self.sections
    }

    pub fn post_prompt(&self) -> Option<&str> {
        self.post_prompt.as_deref()
    }

    /// Markdown: `## Title`, then the body paragraph, then `- bullet` lines,
    /// sections separated by a blank line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            section.render_into(&mut out);
        }
        out
    }

    pub fn compose(&self, registry: &CapabilityRegistry) -> AgentDocument {
        let remote_functions: Vec<Value> = registry
            .remote_specs()
            .iter()
            .map(|spec| spec.to_function_document())
            .collect();
        let functions = registry.manifest();

        tracing::debug!(
            sections = self.sections.len(),
            functions = functions.len(),
            remote_functions = remote_functions.len(),
            "composed agent document"
        );

        AgentDocument {
            prompt: self.render(),
            post_prompt: self.post_prompt.clone(),
            functions,
            remote_functions,
        }
    }

    fn push(&mut self, title: String, body: Option<String>, bullets: Vec<String>) -> &mut Self {
        self.sections.push(PromptSection {
            title,
            body,
            bullets,
        });
        self
    }
}
