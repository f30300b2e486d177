use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::Selection;

/// One tappable option on a screen: a human label plus the wire token the
/// transport must echo back when the option is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, selection: &Selection) -> Self {
        Self {
            label: label.into(),
            data: selection.encode(),
        }
    }
}

/// A catalog photo that was present on disk when the catalog was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(pub PathBuf);

impl ImageRef {
    /// Wraps `path` only if the file exists; screens fall back to plain text
    /// otherwise.
    pub fn existing(path: PathBuf) -> Option<ImageRef> {
        path.exists().then(|| ImageRef(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// What the dialogue wants shown next, free of any transport types.
///
/// `replace_previous` asks the presenter to retire the previous prompt for
/// this chat (delete it, collapse its buttons) before showing this one, so the
/// user cannot tap options of a screen the dialogue has already left. A
/// presenter that cannot replace may ignore the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderDirective {
    pub text: String,
    pub choices: Vec<Choice>,
    /// How many choices a presenter may lay out per row. Menus default to a
    /// single column.
    pub columns: usize,
    pub image: Option<ImageRef>,
    pub replace_previous: bool,
    pub markdown: bool,
}

impl RenderDirective {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            columns: 1,
            image: None,
            replace_previous: false,
            markdown: false,
        }
    }

    pub fn choice(mut self, label: impl Into<String>, selection: &Selection) -> Self {
        self.choices.push(Choice::new(label, selection));
        self
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_image(mut self, image: Option<ImageRef>) -> Self {
        self.image = image;
        self
    }

    pub fn replace_previous(mut self) -> Self {
        self.replace_previous = true;
        self
    }

    pub fn markdown(mut self) -> Self {
        self.markdown = true;
        self
    }
}

/// Outbound boundary towards the user. The engine never talks to a chat
/// platform directly; the service hands every directive to its adapter.
#[async_trait]
pub trait PresentationAdapter: Send + Sync {
    async fn render(&self, chat_id: &str, directive: &RenderDirective) -> Result<()>;
}
