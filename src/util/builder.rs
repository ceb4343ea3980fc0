use twilight_model::channel::message::component::{ActionRow, Button, ButtonStyle, TextInput, TextInputStyle};
use twilight_model::channel::message::{Component, ReactionType};

/// The maximum number of components within an action row.
pub const ROW_LEN: usize = 5;

/// Create an action row with a builder.
#[must_use = "must be built into an action row"]
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRowBuilder(ActionRow);

impl ActionRowBuilder {
    /// Creates a new action row builder, keeping at most five components.
    pub fn new(components: impl IntoIterator<Item = impl Into<Component>>) -> Self {
        let components = components.into_iter().take(ROW_LEN).map(Into::into).collect();

        Self(ActionRow { components })
    }

    /// Build into an action row.
    #[inline]
    #[must_use = "should be used as part of a component"]
    pub fn build(self) -> ActionRow {
        self.0
    }
}

impl From<ActionRowBuilder> for Component {
    #[inline]
    fn from(value: ActionRowBuilder) -> Self {
        Self::ActionRow(value.build())
    }
}

/// Create a button with a builder.
#[must_use = "must be built into a button"]
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonBuilder(Button);

impl ButtonBuilder {
    /// Creates a new button builder.
    #[inline]
    pub fn new(style: impl Into<ButtonStyle>) -> Self {
        Self(Button { custom_id: None, disabled: false, emoji: None, label: None, style: style.into(), url: None })
    }

    /// Add a custom identifier.
    pub fn custom_id(mut self, custom_id: impl ToString) -> Self {
        self.0.custom_id = Some(custom_id.to_string());

        self
    }

    /// Sets whether the button is disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.0.disabled = disabled;

        self
    }

    /// Add an emoji.
    pub fn emoji(mut self, emoji: impl Into<ReactionType>) -> Self {
        self.0.emoji = Some(emoji.into());

        self
    }

    /// Add a label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.0.label = Some(label.into());

        self
    }

    /// Build into a button.
    #[inline]
    #[must_use = "should be used as part of a component"]
    pub fn build(self) -> Button {
        self.0
    }
}

impl From<ButtonBuilder> for Button {
    #[inline]
    fn from(value: ButtonBuilder) -> Self {
        value.build()
    }
}

impl From<ButtonBuilder> for Component {
    #[inline]
    fn from(value: ButtonBuilder) -> Self {
        Self::Button(value.build())
    }
}

/// Create a text input with a builder.
#[must_use = "must be built into a text input"]
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextInputBuilder(TextInput);

impl TextInputBuilder {
    /// Creates a new text input builder.
    #[inline]
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: impl Into<TextInputStyle>) -> Self {
        Self(TextInput {
            custom_id: custom_id.into(),
            label: label.into(),
            max_length: None,
            min_length: None,
            placeholder: None,
            required: None,
            style: style.into(),
            value: None,
        })
    }

    /// Add a maximum length.
    pub fn max_length(mut self, max_length: u16) -> Self {
        self.0.max_length = Some(max_length);

        self
    }

    /// Add a placeholder.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.0.placeholder = Some(placeholder.into());

        self
    }

    /// Set whether the text input is required.
    pub fn required(mut self, required: bool) -> Self {
        self.0.required = Some(required);

        self
    }

    /// Build into a text input.
    #[inline]
    #[must_use = "should be used as part of a component"]
    pub fn build(self) -> TextInput {
        self.0
    }
}

impl From<TextInputBuilder> for TextInput {
    #[inline]
    fn from(value: TextInputBuilder) -> Self {
        value.build()
    }
}

impl From<TextInputBuilder> for Component {
    #[inline]
    fn from(value: TextInputBuilder) -> Self {
        Self::TextInput(value.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_capped() {
        let buttons = (0 .. 8).map(|i| ButtonBuilder::new(ButtonStyle::Secondary).custom_id(i));
        let row = ActionRowBuilder::new(buttons).build();

        assert_eq!(row.components.len(), ROW_LEN);
    }

    #[test]
    fn button_fields_are_set() {
        let button = ButtonBuilder::new(ButtonStyle::Success)
            .custom_id("watch$start")
            .label("Start")
            .disabled(true)
            .emoji(ReactionType::Unicode { name: "▶️".to_string() })
            .build();

        assert_eq!(button.custom_id.as_deref(), Some("watch$start"));
        assert_eq!(button.label.as_deref(), Some("Start"));
        assert!(button.disabled);
        assert!(button.emoji.is_some());
    }
}
