//! Template registry (spec §4.5): "the registry of `{name -> (subject, body,
//! required_fields)}` is an external collaborator." No templating crate is
//! pulled in -- named-placeholder substitution is all the ambient stack
//! needs, matching the teacher's preference for hand-rolled wire formats
//! over heavyweight crates where a simple one suffices.

use std::collections::HashMap;

use crate::error::CommunicatorError;

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub subject_template: String,
    pub body_template: String,
    pub required_fields: Vec<String>,
}

pub trait TemplateRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<Template>;
}

#[derive(Default)]
pub struct InMemoryTemplateRegistry {
    templates: HashMap<String, Template>,
}

impl InMemoryTemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }
}

impl TemplateRegistry for InMemoryTemplateRegistry {
    fn get(&self, name: &str) -> Option<Template> {
        self.templates.get(name).cloned()
    }
}

/// Substitutes `{{field}}` placeholders in `template` with values from
/// `data`, a flat JSON object. Non-string values are rendered via their
/// JSON display form.
fn render_one(
    template_name: &str,
    template: &str,
    data: &serde_json::Value,
) -> Result<String, CommunicatorError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| CommunicatorError::MissingField {
            template: template_name.to_owned(),
            field: "<unterminated placeholder>".to_owned(),
        })?;
        let field = after[..end].trim();
        let value = data.get(field).ok_or_else(|| CommunicatorError::MissingField {
            template: template_name.to_owned(),
            field: field.to_owned(),
        })?;
        match value {
            serde_json::Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Renders `subject` and `body`, first checking every `required_fields`
/// entry is present in `data` (spec §4.5: dispatch fails fast on a missing
/// required field rather than rendering a partial message).
pub fn render(template: &Template, data: &serde_json::Value) -> Result<(String, String), CommunicatorError> {
    for field in &template.required_fields {
        if data.get(field).is_none() {
            return Err(CommunicatorError::MissingField {
                template: template.name.clone(),
                field: field.clone(),
            });
        }
    }
    let subject = render_one(&template.name, &template.subject_template, data)?;
    let body = render_one(&template.name, &template.body_template, data)?;
    Ok((subject, body))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Template {
        Template {
            name: "clarification".to_owned(),
            subject_template: "Question about payment {{transaction_id}}".to_owned(),
            body_template: "We received {{amount}} but could not match it.".to_owned(),
            required_fields: vec!["transaction_id".to_owned(), "amount".to_owned()],
        }
    }

    #[test]
    fn renders_placeholders_from_data() {
        let t = sample();
        let data = json!({"transaction_id": "TXN-1", "amount": "100.00"});
        let (subject, body) = render(&t, &data).unwrap();
        assert_eq!(subject, "Question about payment TXN-1");
        assert_eq!(body, "We received 100.00 but could not match it.");
    }

    #[test]
    fn missing_required_field_fails_fast() {
        let t = sample();
        let data = json!({"transaction_id": "TXN-1"});
        let err = render(&t, &data).unwrap_err();
        assert!(matches!(err, CommunicatorError::MissingField { field, .. } if field == "amount"));
    }

    #[test]
    fn registry_lookup_miss_is_none() {
        let registry = InMemoryTemplateRegistry::new();
        assert!(registry.get("nope").is_none());
    }
}
