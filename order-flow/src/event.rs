use serde::{Deserialize, Serialize};

use crate::catalog::FamilyId;

/// A decoded tap on one of the options a screen offered.
///
/// The wire encoding (`category_*`, `item_*`, `wrap_*`, `fillb_*`,
/// `setfill_*`, `ribbonb_*`, `ribbons_*` plus a handful of literals) is the
/// compatibility contract with already-deployed keyboards, so both directions
/// live here and must stay in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    Family(FamilyId),
    Product(String),
    WrapColor(String),
    BouquetFilling(String),
    SetFilling(String),
    BouquetRibbon(String),
    SetRibbon(String),
    BackToFamilies,
    BackToProducts(FamilyId),
    Confirm,
    Restart,
}

impl Selection {
    /// Decodes a callback token. `None` means the token matches no screen this
    /// dialogue ever produced and should be dropped at the boundary.
    pub fn parse(data: &str) -> Option<Selection> {
        match data {
            "back_to_categories" => return Some(Selection::BackToFamilies),
            "back_to_bouquets" => return Some(Selection::BackToProducts(FamilyId::Bouquets)),
            "back_to_sets" => return Some(Selection::BackToProducts(FamilyId::Sets)),
            "confirm_final" => return Some(Selection::Confirm),
            "restart" => return Some(Selection::Restart),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("category_") {
            return FamilyId::parse(rest).map(Selection::Family);
        }
        if let Some(rest) = data.strip_prefix("item_") {
            return Some(Selection::Product(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("wrap_") {
            return Some(Selection::WrapColor(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("fillb_") {
            return Some(Selection::BouquetFilling(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("setfill_") {
            return Some(Selection::SetFilling(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("ribbonb_") {
            return Some(Selection::BouquetRibbon(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("ribbons_") {
            return Some(Selection::SetRibbon(rest.to_string()));
        }
        None
    }

    pub fn encode(&self) -> String {
        match self {
            Selection::Family(family) => format!("category_{family}"),
            Selection::Product(id) => format!("item_{id}"),
            Selection::WrapColor(id) => format!("wrap_{id}"),
            Selection::BouquetFilling(id) => format!("fillb_{id}"),
            Selection::SetFilling(id) => format!("setfill_{id}"),
            Selection::BouquetRibbon(id) => format!("ribbonb_{id}"),
            Selection::SetRibbon(id) => format!("ribbons_{id}"),
            Selection::BackToFamilies => "back_to_categories".to_string(),
            Selection::BackToProducts(FamilyId::Bouquets) => "back_to_bouquets".to_string(),
            Selection::BackToProducts(FamilyId::Sets) => "back_to_sets".to_string(),
            Selection::Confirm => "confirm_final".to_string(),
            Selection::Restart => "restart".to_string(),
        }
    }
}

/// Everything a transport can feed into one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// The entry command; always allowed and always starts a fresh draft.
    Start,
    /// The abort command; drops the session from any state.
    Cancel,
    Select(Selection),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_tokens() {
        assert_eq!(
            Selection::parse("category_bouquets"),
            Some(Selection::Family(FamilyId::Bouquets))
        );
        assert_eq!(
            Selection::parse("item_b2"),
            Some(Selection::Product("b2".to_string()))
        );
        assert_eq!(
            Selection::parse("wrap_pink"),
            Some(Selection::WrapColor("pink".to_string()))
        );
        assert_eq!(
            Selection::parse("fillb_sweetB"),
            Some(Selection::BouquetFilling("sweetB".to_string()))
        );
        assert_eq!(
            Selection::parse("setfill_spicy-lacritsaS"),
            Some(Selection::SetFilling("spicy-lacritsaS".to_string()))
        );
        assert_eq!(
            Selection::parse("ribbonb_burgundy"),
            Some(Selection::BouquetRibbon("burgundy".to_string()))
        );
        assert_eq!(
            Selection::parse("ribbons_ferrari"),
            Some(Selection::SetRibbon("ferrari".to_string()))
        );
    }

    #[test]
    fn parses_literal_tokens() {
        assert_eq!(Selection::parse("back_to_categories"), Some(Selection::BackToFamilies));
        assert_eq!(
            Selection::parse("back_to_bouquets"),
            Some(Selection::BackToProducts(FamilyId::Bouquets))
        );
        assert_eq!(
            Selection::parse("back_to_sets"),
            Some(Selection::BackToProducts(FamilyId::Sets))
        );
        assert_eq!(Selection::parse("confirm_final"), Some(Selection::Confirm));
        assert_eq!(Selection::parse("restart"), Some(Selection::Restart));
    }

    #[test]
    fn rejects_foreign_tokens() {
        assert_eq!(Selection::parse(""), None);
        assert_eq!(Selection::parse("zzz"), None);
        assert_eq!(Selection::parse("category_flowers"), None);
        assert_eq!(Selection::parse("ribbon_pink"), None);
    }

    #[test]
    fn encode_inverts_parse() {
        for token in [
            "category_sets",
            "item_s4",
            "wrap_darkgreen",
            "fillb_sweet-lacritsaB",
            "setfill_lacritsaS",
            "ribbonb_negreengold",
            "ribbons_yellow",
            "back_to_categories",
            "back_to_bouquets",
            "back_to_sets",
            "confirm_final",
            "restart",
        ] {
            let selection = Selection::parse(token).expect(token);
            assert_eq!(selection.encode(), token);
        }
    }
}
