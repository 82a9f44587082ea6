//! Shared controls panel
//!
//! One [`ControlsPanel`] exists per panel title. Components add rows to it
//! while they run; during `finalize` the panel writes every row to the
//! script sink as one block and registers its panel class.

use rigforge_core::prelude::*;
use rigforge_core::PluginRef;

/// Panel rows collected from several components
#[derive(Debug)]
pub struct ControlsPanel {
    title: String,
    rows: Vec<(String, String)>,
}

impl ControlsPanel {
    /// The run's panel titled `title`
    ///
    /// # Errors
    /// Plugin construction failures.
    pub fn request(
        ctx: &mut StageContext<'_, '_>,
        title: &str,
    ) -> Result<PluginRef<Self>, GenerateError> {
        ctx.plugin::<Self>(title.to_string())
    }

    /// Append a row of panel code on behalf of `contributor`
    pub fn add_row(&mut self, contributor: impl Into<String>, code: impl Into<String>) {
        self.rows.push((contributor.into(), code.into()));
    }

    /// Collected rows as `(contributor, code)`
    #[must_use]
    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// Class name registered for this panel
    #[must_use]
    pub fn class_name(&self) -> String {
        let ident: String = self
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("RIGFORGE_PT_{ident}")
    }

    fn finalize(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if self.rows.is_empty() {
            return Ok(());
        }
        let contributor = format!("panel {}", self.title);
        let mut lines = vec![format!("layout.label(text={:?})", self.title)];
        lines.extend(self.rows.iter().map(|(_, code)| code.clone()));

        let script = ctx.script();
        script.add_panel_code(&contributor, lines);
        script.register_classes(&contributor, vec![self.class_name()]);
        tracing::debug!(panel = %self.title, rows = self.rows.len(), "panel written");
        Ok(())
    }
}

impl Plugin for ControlsPanel {
    type Args = String;

    const NAME: &'static str = "controls_panel";

    fn create(title: &String, _ctx: &mut StageContext<'_, '_>) -> Result<Self, GenerateError> {
        if title.trim().is_empty() {
            return Err(GenerateError::component("controls panel needs a title"));
        }
        Ok(Self {
            title: title.clone(),
            rows: Vec::new(),
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("ControlsPanel")
            .hook("finalize", Self::finalize)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_is_identifier() {
        let panel = ControlsPanel {
            title: "Arm Controls.L".to_string(),
            rows: Vec::new(),
        };
        assert_eq!(panel.class_name(), "RIGFORGE_PT_Arm_Controls_L");
    }
}
