use super::Bindings;

#[derive(Clone, Eq, PartialEq, Debug)]
enum Part {
    Text(String),
    Variable(String),
}

/// A destination with its `:name` placeholders located ahead of time.
///
/// Only names the rule declares are placeholders. Any other `:` is kept as
/// text, which leaves schemes, ports and the like untouched.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    pub fn compile<'a>(template: &str, declared: impl IntoIterator<Item = &'a str>) -> Self {
        let declared: Vec<&str> = declared.into_iter().collect();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = template;

        while let Some(colon) = rest.find(':') {
            let after = &rest[colon + 1..];
            let name_len = after
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            text.push_str(&rest[..colon]);
            if declared.contains(&name) {
                if !text.is_empty() {
                    parts.push(Part::Text(std::mem::take(&mut text)));
                }
                parts.push(Part::Variable(name.to_owned()));
            } else {
                text.push(':');
                text.push_str(name);
            }
            rest = &after[name_len..];
        }

        text.push_str(rest);
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Self { parts }
    }

    /// Unbound placeholders render as empty strings.
    pub fn render(&self, bindings: &Bindings) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => text.as_str(),
                Part::Variable(name) => bindings.get(name).map_or("", String::as_str),
            })
            .collect()
    }
}
