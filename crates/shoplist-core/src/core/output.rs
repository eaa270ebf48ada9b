use crate::core::codec;

/// One inline button: a label and the token sent back when it is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, node: &str, operation: &str) -> Self {
        Self {
            label: label.into(),
            token: codec::encode(node, operation),
        }
    }

    /// Button carrying an already encoded token.
    pub fn with_token(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Rows of buttons under a rendered message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn row(mut self, row: Vec<Button>) -> Self {
        self.push_row(row);
        self
    }

    pub fn push_row(&mut self, row: Vec<Button>) {
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Render-agnostic result of a node call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub text: String,
    pub keyboard: Keyboard,
    /// Sent to the other members of the user's community.
    pub broadcast_text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl Output {
    pub fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
            broadcast_text: None,
            image: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, Keyboard::new())
    }

    #[must_use]
    pub fn with_broadcast(mut self, text: impl Into<String>) -> Self {
        self.broadcast_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }
}
