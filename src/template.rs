//! Outreach message templates with `{name}` personalization.

/// The single placeholder the template language recognizes.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// A message body with zero or more `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    body: String,
}

impl MessageTemplate {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether the body contains at least one `{name}` placeholder.
    pub fn has_placeholder(&self) -> bool {
        self.body.contains(NAME_PLACEHOLDER)
    }

    /// Substitute every `{name}` occurrence with the display name.
    pub fn render(&self, display_name: &str) -> String {
        self.body.replace(NAME_PLACEHOLDER, display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_single_occurrence() {
        let t = MessageTemplate::new("Hi {name}!");
        let rendered = t.render("Asha");
        assert_eq!(rendered, "Hi Asha!");
        assert!(!rendered.contains(NAME_PLACEHOLDER));
    }

    #[test]
    fn substitutes_every_occurrence() {
        let t = MessageTemplate::new("{name}, this is for {name}.");
        assert_eq!(t.render("Omar"), "Omar, this is for Omar.");
    }

    #[test]
    fn body_without_placeholder_passes_through() {
        let t = MessageTemplate::new("Hello there");
        assert!(!t.has_placeholder());
        assert_eq!(t.render("Asha"), "Hello there");
    }
}
