use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::FamilyId;
use crate::error::{FlowError, Result};

/// Identity of the person driving a session, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub username: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Where a draft currently sits in the dialogue.
///
/// The ribbon and price steps exist once per family so that every state has
/// exactly one meaning; the two paths merge again at `Confirming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowState {
    #[default]
    ChoosingFamily,
    ChoosingProduct,
    ChoosingWrapColor,
    ChoosingFilling,
    ChoosingBouquetRibbon,
    TypingColorPreferences,
    TypingBouquetPrice,
    ChoosingSetFilling,
    ChoosingSetRibbon,
    TypingSetPrice,
    Confirming,
}

/// One user's in-progress order.
///
/// Attribute fields store display labels, not option ids: once a selection is
/// accepted the dialogue only ever shows it back to people. Selection setters
/// clear everything downstream, so a draft can never mix choices from two
/// different products. Back-navigation alone clears nothing below the step it
/// returns to; stale values are overwritten when the user moves forward again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub profile: UserProfile,
    pub state: FlowState,
    pub family: Option<FamilyId>,
    pub product: Option<String>,
    pub product_label: Option<String>,
    pub wrap_color: Option<String>,
    pub filling: Option<String>,
    pub set_filling: Option<String>,
    pub ribbon_color: Option<String>,
    pub color_preferences: Option<String>,
    pub price: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl OrderDraft {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            state: FlowState::default(),
            family: None,
            product: None,
            product_label: None,
            wrap_color: None,
            filling: None,
            set_filling: None,
            ribbon_color: None,
            color_preferences: None,
            price: None,
            updated_at: Utc::now(),
        }
    }

    /// Drops every selection and returns to the first screen. The entry
    /// command is valid at any point of the dialogue.
    pub fn restart(&mut self) {
        self.state = FlowState::ChoosingFamily;
        self.family = None;
        self.product = None;
        self.product_label = None;
        self.clear_attributes();
    }

    pub fn select_family(&mut self, family: FamilyId) {
        self.family = Some(family);
        self.product = None;
        self.product_label = None;
        self.clear_attributes();
    }

    pub fn select_product(&mut self, id: impl Into<String>, label: impl Into<String>) {
        self.product = Some(id.into());
        self.product_label = Some(label.into());
        self.clear_attributes();
    }

    pub fn clear_family(&mut self) {
        self.family = None;
    }

    pub fn clear_product(&mut self) {
        self.product = None;
        self.product_label = None;
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn clear_attributes(&mut self) {
        self.wrap_color = None;
        self.filling = None;
        self.set_filling = None;
        self.ribbon_color = None;
        self.color_preferences = None;
        self.price = None;
    }

    pub fn require_family(&self) -> Result<FamilyId> {
        self.family.ok_or(FlowError::MissingDraftField("family"))
    }

    pub fn require_product(&self) -> Result<&str> {
        require(&self.product, "product")
    }

    pub fn require_product_label(&self) -> Result<&str> {
        require(&self.product_label, "product_label")
    }

    pub fn require_wrap_color(&self) -> Result<&str> {
        require(&self.wrap_color, "wrap_color")
    }

    pub fn require_filling(&self) -> Result<&str> {
        require(&self.filling, "filling")
    }

    pub fn require_set_filling(&self) -> Result<&str> {
        require(&self.set_filling, "set_filling")
    }

    pub fn require_ribbon_color(&self) -> Result<&str> {
        require(&self.ribbon_color, "ribbon_color")
    }

    pub fn require_color_preferences(&self) -> Result<&str> {
        require(&self.color_preferences, "color_preferences")
    }

    pub fn require_price(&self) -> Result<&str> {
        require(&self.price, "price")
    }
}

fn require<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    field.as_deref().ok_or(FlowError::MissingDraftField(name))
}
