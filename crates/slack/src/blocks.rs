//! Block Kit message and modal builders.
//!
//! The structures serialize to the exact shapes the Slack Web API expects,
//! so templates can be posted without any hand-written JSON.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    #[serde(rename = "type")]
    element_type: &'static str,
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            element_type: "button",
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// A modal view, addressable either by `trigger_id` at open/push time or by
/// `external_id` later via `views.update`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    view_type: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    pub private_metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub blocks: Vec<Block>,
}

impl ModalView {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            view_type: "modal",
            callback_id: callback_id.into(),
            title: TextObject::plain(title),
            submit: None,
            private_metadata: String::new(),
            external_id: None,
            blocks: Vec::new(),
        }
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(TextObject::plain(label));
        self
    }

    pub fn private_metadata(mut self, token: impl Into<String>) -> Self {
        self.private_metadata = token.into();
        self
    }

    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn section(mut self, block_id: impl Into<String>, text: TextObject) -> Self {
        self.blocks.push(Block::Section { block_id: block_id.into(), text });
        self
    }

    pub fn context(mut self, block_id: impl Into<String>, elements: Vec<TextObject>) -> Self {
        self.blocks.push(Block::Context { block_id: block_id.into(), elements });
        self
    }
}

// ---------------------------------------------------------------------------
// grantbot templates
// ---------------------------------------------------------------------------

/// Threaded reply under a detected hackathon URL. The button value carries
/// the signed token for the freshly created application.
pub fn apply_prompt_message(user_id: &str, token: &str) -> MessageTemplate {
    MessageBuilder::new(format!("<@{user_id}> over here!"))
        .section("apply.prompt.v1", |section| {
            section.mrkdwn(
                "is this a hackathon I spot? click the button to start your application!",
            );
        })
        .actions("apply.prompt.actions.v1", |actions| {
            actions.button(
                ButtonElement::new("apply", ":point_right: APPLY :point_left:")
                    .style(ButtonStyle::Primary)
                    .value(token),
            );
        })
        .build()
}

pub const SUBMITTED_TEXT: &str =
    "Your application has been submitted! We'll review it and get back to you within 24 hours.";

/// Replaces the threaded prompt once the application has been submitted.
pub fn submitted_message() -> MessageTemplate {
    MessageBuilder::new(SUBMITTED_TEXT)
        .section("apply.submitted.v1", |section| {
            section.mrkdwn(SUBMITTED_TEXT);
        })
        .build()
}

/// Ephemeral hint for messages without any detectable URL.
pub fn no_url_hint() -> &'static str {
    "Hmm, I don't see a URL in that message— try posting your hackathon's website URL here!"
}

/// First modal: confirm the detected link before continuing.
pub fn apply_view(url: &str, token: &str) -> ModalView {
    ModalView::new("apply", "Apply")
        .submit("Next")
        .private_metadata(token)
        .section("apply.confirm.url.v1", TextObject::mrkdwn(format!("Applying for: <{url}>")))
        .section(
            "apply.confirm.hint.v1",
            TextObject::plain("Hit Next to upload proof of your venue."),
        )
}

/// Second modal: venue-proof upload. `upload_url` points at the HTTP form;
/// once the proof has arrived the view is re-rendered with a checkmark.
pub fn upload_view(token: &str, external_id: &str, upload_url: &str, proof_uploaded: bool) -> ModalView {
    let status = if proof_uploaded {
        TextObject::mrkdwn(":white_check_mark: venue proof received!".to_owned())
    } else {
        TextObject::mrkdwn(format!("Upload proof of your venue here: <{upload_url}>"))
    };

    ModalView::new("apply2", "Venue proof")
        .submit("Submit application")
        .private_metadata(token)
        .external_id(external_id)
        .section("apply.upload.status.v1", status)
        .context(
            "apply.upload.context.v1",
            vec![TextObject::plain("Leave this open while you upload; it updates by itself.")],
        )
}
