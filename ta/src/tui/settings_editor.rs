//! Settings editor sub-machine
//!
//! A linear list of fields, each either free text (optionally masked) or an
//! option cycle. Edits accumulate in a draft [`Settings`] value that only
//! replaces the real settings on "save all".

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::theme::THEME_NAMES;
use crate::config::Settings;
use crate::providers::ProviderRegistry;

/// Longest run of mask characters shown for a secret
const MASK_MAX: usize = 32;

/// Which setting a field edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    WorkspaceGid,
    ProjectGid,
    OutputDir,
    /// Stored API key for a provider id
    ApiKey(String),
    Theme,
    Provider,
    Model,
}

/// Field editing behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text { value: String, secret: bool },
    Choice { options: Vec<String>, selected: usize },
}

/// One editable row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: FieldKey,
    pub label: String,
    pub kind: FieldKind,
}

impl Field {
    fn text(key: FieldKey, label: impl Into<String>, value: impl Into<String>, secret: bool) -> Self {
        Self {
            key,
            label: label.into(),
            kind: FieldKind::Text {
                value: value.into(),
                secret,
            },
        }
    }

    fn choice(key: FieldKey, label: impl Into<String>, options: Vec<String>, selected: usize) -> Self {
        Self {
            key,
            label: label.into(),
            kind: FieldKind::Choice { options, selected },
        }
    }

    /// Current value as entered or selected
    pub fn value(&self) -> &str {
        match &self.kind {
            FieldKind::Text { value, .. } => value,
            FieldKind::Choice { options, selected } => options.get(*selected).map(String::as_str).unwrap_or(""),
        }
    }

    /// Value as it should be displayed (secrets masked)
    pub fn display_value(&self) -> String {
        match &self.kind {
            FieldKind::Text { value, secret: true } => "•".repeat(value.chars().count().min(MASK_MAX)),
            _ => self.value().to_string(),
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, FieldKind::Choice { .. })
    }
}

/// Settings editor state
#[derive(Debug, Clone)]
pub struct SettingsEditor {
    fields: Vec<Field>,
    focus: usize,
    draft: Settings,
    registry: Arc<ProviderRegistry>,
}

impl SettingsEditor {
    /// Open the editor over a copy of the committed settings
    pub fn new(settings: &Settings, registry: Arc<ProviderRegistry>) -> Self {
        debug!("SettingsEditor::new: called");
        let mut draft = settings.clone();
        draft.normalize(&registry);

        let mut fields = vec![
            Field::text(FieldKey::WorkspaceGid, "Workspace GID", &draft.workspace_gid, false),
            Field::text(FieldKey::ProjectGid, "Project GID", &draft.project_gid, false),
            Field::text(
                FieldKey::OutputDir,
                "Output directory",
                draft.output_dir.display().to_string(),
                false,
            ),
        ];
        for provider in registry.all().iter().filter(|p| p.requires_key()) {
            fields.push(Field::text(
                FieldKey::ApiKey(provider.id.clone()),
                format!("{} API Key", provider.name),
                draft.stored_key(&provider.id),
                true,
            ));
        }

        let themes: Vec<String> = THEME_NAMES.iter().map(|t| t.to_string()).collect();
        let theme_index = themes.iter().position(|t| *t == draft.theme).unwrap_or(0);
        fields.push(Field::choice(FieldKey::Theme, "Theme", themes, theme_index));

        let provider_index = registry.index_of(&draft.provider).unwrap_or(0);
        fields.push(Field::choice(FieldKey::Provider, "AI Provider", registry.ids(), provider_index));

        let (models, model_index) = match registry.get(&draft.provider) {
            Some(p) => (p.models.clone(), p.model_index(&draft.model)),
            None => (Vec::new(), 0),
        };
        fields.push(Field::choice(FieldKey::Model, "Model", models, model_index));

        Self {
            fields,
            focus: 0,
            draft,
            registry,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn focused(&self) -> &Field {
        &self.fields[self.focus]
    }

    /// The parallel draft settings object
    pub fn draft(&self) -> &Settings {
        &self.draft
    }

    pub fn field(&self, key: &FieldKey) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == *key)
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
        debug!(focus = self.focus, "SettingsEditor::focus_next: called");
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        debug!(focus = self.focus, "SettingsEditor::focus_prev: called");
    }

    /// Type a character into the focused text field
    pub fn input_char(&mut self, c: char) {
        if let FieldKind::Text { value, .. } = &mut self.fields[self.focus].kind {
            value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let FieldKind::Text { value, .. } = &mut self.fields[self.focus].kind {
            value.pop();
        }
    }

    /// Enter: commit a text field and advance, or cycle an option field
    pub fn confirm(&mut self) {
        debug!(focus = self.focus, "SettingsEditor::confirm: called");
        if self.fields[self.focus].is_choice() {
            self.cycle(1);
        } else {
            let field = self.fields[self.focus].clone();
            apply_field(&field, &mut self.draft);
            self.focus_next();
        }
    }

    /// Cycle the focused option field forward (`delta > 0`) or backward
    pub fn cycle(&mut self, delta: isize) {
        let changed_provider = {
            let field = &mut self.fields[self.focus];
            let FieldKind::Choice { options, selected } = &mut field.kind else {
                return;
            };
            if options.is_empty() {
                return;
            }
            let len = options.len() as isize;
            *selected = ((*selected as isize + delta).rem_euclid(len)) as usize;
            debug!(label = %field.label, value = %options[*selected], "SettingsEditor::cycle: selected");
            field.key == FieldKey::Provider
        };

        let field = self.fields[self.focus].clone();
        apply_field(&field, &mut self.draft);

        if changed_provider {
            self.reset_model_options();
        }
    }

    /// Point the model field at the draft provider's models and default
    fn reset_model_options(&mut self) {
        let Some(provider) = self.registry.get(&self.draft.provider) else {
            return;
        };
        debug!(provider = %provider.id, "SettingsEditor::reset_model_options: called");
        let models = provider.models.clone();
        let selected = provider.model_index(&provider.default_model);
        self.draft.model = provider.default_model.clone();
        if let Some(field) = self.fields.iter_mut().find(|f| f.key == FieldKey::Model) {
            field.kind = FieldKind::Choice {
                options: models,
                selected,
            };
        }
    }

    /// Commit every field's current value into a copy of the draft
    pub fn save_all(&self) -> Settings {
        debug!("SettingsEditor::save_all: called");
        let mut settings = self.draft.clone();
        for field in &self.fields {
            apply_field(field, &mut settings);
        }
        settings.normalize(&self.registry);
        settings
    }
}

fn apply_field(field: &Field, settings: &mut Settings) {
    let value = field.value().trim();
    match &field.key {
        FieldKey::WorkspaceGid => settings.workspace_gid = value.to_string(),
        FieldKey::ProjectGid => settings.project_gid = value.to_string(),
        FieldKey::OutputDir => {
            settings.output_dir = if value.is_empty() {
                Settings::default().output_dir
            } else {
                PathBuf::from(value)
            }
        }
        FieldKey::ApiKey(id) => settings.set_stored_key(id, value),
        FieldKey::Theme => settings.theme = value.to_string(),
        FieldKey::Provider => settings.provider = value.to_string(),
        FieldKey::Model => settings.model = value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> SettingsEditor {
        SettingsEditor::new(&Settings::default(), Arc::new(ProviderRegistry::builtin()))
    }

    fn focus_key(editor: &mut SettingsEditor, key: FieldKey) {
        for _ in 0..editor.fields().len() {
            if editor.focused().key == key {
                return;
            }
            editor.focus_next();
        }
        panic!("field {:?} not found", key);
    }

    #[test]
    fn test_field_layout() {
        let editor = editor();
        let labels: Vec<&str> = editor.fields().iter().map(|f| f.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Workspace GID",
                "Project GID",
                "Output directory",
                "Anthropic API Key",
                "OpenAI API Key",
                "Groq API Key",
                "Moonshot API Key",
                "Theme",
                "AI Provider",
                "Model",
            ]
        );
    }

    #[test]
    fn test_focus_wraps() {
        let mut editor = editor();
        editor.focus_prev();
        assert_eq!(editor.focus(), editor.fields().len() - 1);
        editor.focus_next();
        assert_eq!(editor.focus(), 0);
    }

    #[test]
    fn test_enter_commits_text_into_draft_and_advances() {
        let mut editor = editor();
        for c in "ws-1".chars() {
            editor.input_char(c);
        }
        assert_eq!(editor.draft().workspace_gid, "");
        editor.confirm();
        assert_eq!(editor.draft().workspace_gid, "ws-1");
        assert_eq!(editor.focus(), 1);
    }

    #[test]
    fn test_secret_is_masked() {
        let mut editor = editor();
        focus_key(&mut editor, FieldKey::ApiKey("openai".to_string()));
        for c in "sk-secret".chars() {
            editor.input_char(c);
        }
        editor.backspace();
        assert_eq!(editor.focused().value(), "sk-secre");
        assert_eq!(editor.focused().display_value(), "••••••••");
    }

    #[test]
    fn test_mask_is_capped() {
        let mut editor = editor();
        focus_key(&mut editor, FieldKey::ApiKey("groq".to_string()));
        for _ in 0..50 {
            editor.input_char('x');
        }
        assert_eq!(editor.focused().display_value().chars().count(), MASK_MAX);
    }

    #[test]
    fn test_provider_change_resets_model_options() {
        let committed = Settings::default();
        let mut editor = SettingsEditor::new(&committed, Arc::new(ProviderRegistry::builtin()));
        focus_key(&mut editor, FieldKey::Provider);

        // anthropic -> openai
        editor.cycle(1);
        assert_eq!(editor.draft().provider, "openai");
        assert_eq!(editor.draft().model, "gpt-4o");
        let model = editor.field(&FieldKey::Model).unwrap();
        assert_eq!(model.value(), "gpt-4o");
        assert!(matches!(&model.kind, FieldKind::Choice { options, .. } if options.len() == 5));
    }

    #[test]
    fn test_enter_on_choice_cycles_in_place() {
        let mut editor = editor();
        focus_key(&mut editor, FieldKey::Theme);
        let focus = editor.focus();
        editor.confirm();
        assert_eq!(editor.focus(), focus);
        assert_eq!(editor.draft().theme, "light");
        editor.cycle(-1);
        assert_eq!(editor.draft().theme, "dark");
    }

    #[test]
    fn test_cycle_backward_wraps() {
        let mut editor = editor();
        focus_key(&mut editor, FieldKey::Provider);
        editor.cycle(-1);
        assert_eq!(editor.draft().provider, "ollama");
        assert_eq!(editor.draft().model, "llama3.3");
    }

    #[test]
    fn test_save_all_includes_uncommitted_text() {
        let mut editor = editor();
        focus_key(&mut editor, FieldKey::ProjectGid);
        for c in "p-7".chars() {
            editor.input_char(c);
        }
        focus_key(&mut editor, FieldKey::Model);
        editor.cycle(1);

        let saved = editor.save_all();
        assert_eq!(saved.project_gid, "p-7");
        assert_eq!(saved.model, "claude-haiku-4-5-20251001");
    }

    #[test]
    fn test_typing_into_choice_is_ignored() {
        let mut editor = editor();
        focus_key(&mut editor, FieldKey::Theme);
        editor.input_char('z');
        editor.backspace();
        assert_eq!(editor.focused().value(), "dark");
    }
}
