//! Fixed templates with named `{{slot}}`s.

use crate::error::{GenerateError, Result};

/// A template whose `{{name}}` slots are filled at render time.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    name: &'static str,
    source: &'static str,
}

impl Template {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Fill every slot. A slot without a value is an error; values for
    /// slots the template lacks are ignored.
    pub fn render(&self, slots: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(GenerateError::Unterminated { template: self.name })?;
            let slot = after[..end].trim();
            let value = slots
                .iter()
                .find(|(name, _)| *name == slot)
                .map(|(_, value)| *value)
                .ok_or_else(|| GenerateError::MissingSlot {
                    template: self.name,
                    slot: slot.to_string(),
                })?;
            out.push_str(value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
