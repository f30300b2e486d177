use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::ImageRef;

/// The two product families a dialogue can walk through. Bouquets collect a
/// wrap color and a free-text palette, sets are constrained by per-product
/// filling rules; the paths merge again at confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FamilyId {
    Bouquets,
    Sets,
}

impl FamilyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyId::Bouquets => "bouquets",
            FamilyId::Sets => "sets",
        }
    }

    pub fn parse(value: &str) -> Option<FamilyId> {
        match value {
            "bouquets" => Some(FamilyId::Bouquets),
            "sets" => Some(FamilyId::Sets),
            _ => None,
        }
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub label: String,
}

/// A product family plus the transport-facing texts that belong to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub label: String,
    pub products: Vec<Product>,
    /// Prompt shown when the user navigates back into this family's menu.
    pub reselect_prompt: String,
    /// Label of the back button offered on screens below this family.
    pub back_label: String,
}

impl Family {
    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }
}

/// Which option pool an [`AttributeSet`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    WrapColor,
    BouquetFilling,
    SetFilling,
    RibbonColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOption {
    pub id: String,
    pub label: String,
}

/// An ordered pool of selectable options. Order is part of the contract:
/// menus render options exactly in catalog order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSet {
    pub kind: AttributeKind,
    pub options: Vec<AttributeOption>,
}

impl AttributeSet {
    pub fn option(&self, id: &str) -> Option<&AttributeOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.option(id).map(|o| o.label.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.option(id).is_some()
    }
}

/// Immutable product data the flow engine consults on every step.
///
/// Built once at startup; sessions never mutate it. `set_filling_rules` maps a
/// set product to the filling ids it may be ordered with. A product without a
/// rule accepts the whole filling pool, and rule entries that do not resolve
/// to a known filling are skipped.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub(crate) families: Vec<Family>,
    pub(crate) wrap_colors: AttributeSet,
    pub(crate) fillings: AttributeSet,
    pub(crate) set_fillings: AttributeSet,
    pub(crate) ribbon_colors: AttributeSet,
    pub(crate) set_filling_rules: Vec<(String, Vec<String>)>,
    pub(crate) wrap_overview: Option<ImageRef>,
    pub(crate) ribbon_overview: Option<ImageRef>,
}

impl Catalog {
    /// The assortment sold today, with overview photos looked up under
    /// `photos_dir`. A missing photo downgrades the screen to plain text, so
    /// absence is recorded as `None` rather than an error.
    pub fn standard(photos_dir: impl AsRef<Path>) -> Self {
        let photos_dir = photos_dir.as_ref();

        let families = vec![
            Family {
                id: FamilyId::Bouquets,
                label: "Букеты💐".to_string(),
                products: products(&[
                    ("b1", "Новогодний букет🎄"),
                    ("b2", "Букет на день рождения🥳"),
                    ("b3", "Букет для второй половинки❤️"),
                    ("b4", "Букет для отчаянных с лакрицей🌚🌝"),
                ]),
                reselect_prompt: "Выберите букет:".to_string(),
                back_label: "← Назад к букетам".to_string(),
            },
            Family {
                id: FamilyId::Sets,
                label: "Наборы🎁".to_string(),
                products: products(&[
                    ("s1", "Новогодний набор🎆"),
                    ("s2", "Набор на день рождения🎂"),
                    ("s3", "Набор 'Смелый' с добавлением лакрицы😎"),
                    ("s4", "Набор 'Самый смелый' с добавлением острого мармелада🔥"),
                ]),
                reselect_prompt: "Выберите набор:".to_string(),
                back_label: "← Назад к наборам".to_string(),
            },
        ];

        let wrap_colors = attribute_set(AttributeKind::WrapColor, &[
            ("black", "Чёрная"),
            ("white-blue", "Светло-голубая"),
            ("newhite", "Белая новогодняя"),
            ("negreen", "Зелёная новогодняя"),
            ("pink", "Розовая"),
            ("blue", "Синяя"),
            ("darkgreen", "Зелёная"),
        ]);

        let fillings = attribute_set(AttributeKind::BouquetFilling, &[
            ("sourB", "Кислый букет😵‍💫"),
            ("sweetB", "Сладкий букет🥹"),
            ("sweet-sourB", "Кисло-сладкий букет🤔"),
            ("sweet-lacritsaB", "Сладкий букет с добавлением лакрицы😳"),
        ]);

        let set_fillings = attribute_set(AttributeKind::SetFilling, &[
            ("sourS", "Кислый набор😵‍💫"),
            ("sweetS", "Сладкий набор🥹"),
            ("sweet-sourS", "Кисло-сладкий набор🤔"),
            ("lacritsaS", "Набор с лакрицей😎"),
            ("sweet-lacritsaS", "Сладкий с лакрицей😳"),
            ("spicy-lacritsaS", "Острый набор с лакрицей🔥"),
        ]);

        let ribbon_colors = attribute_set(AttributeKind::RibbonColor, &[
            ("yellow", "Жёлтая"),
            ("wblue", "Голубая"),
            ("burgundy", "Бордовая"),
            ("pink", "Розовая"),
            ("wlilac", "Светло-сиреневая"),
            ("orange", "Оранжевая"),
            ("crimson", "Малиновая"),
            ("purple", "Фиолетовая"),
            ("green", "Зелёная"),
            ("lilac", "Сиреневая"),
            ("ferrari", "Ferrari"),
            ("negreen", "Тёмно-зеленая новогодняя"),
            ("negold", "Золотая новогодняя"),
            ("negreengold", "Новогодняя зелёное золото"),
            ("neredgold", "Новогодняя красное золото"),
            ("nepurplegold", "Новогодняя фиолетовое золото"),
        ]);

        let set_filling_rules = vec![
            rule("s1", &["sweetS", "sourS", "sweet-sourS"]),
            rule("s2", &["sweetS", "sourS", "sweet-sourS"]),
            rule("s3", &["lacritsaS", "sweet-lacritsaS"]),
            rule("s4", &["spicy-lacritsaS"]),
        ];

        Catalog {
            families,
            wrap_colors,
            fillings,
            set_fillings,
            ribbon_colors,
            set_filling_rules,
            wrap_overview: ImageRef::existing(photos_dir.join("wraps_overview.jpg")),
            ribbon_overview: ImageRef::existing(photos_dir.join("ribbon_overview.png")),
        }
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn family(&self, id: FamilyId) -> &Family {
        self.families
            .iter()
            .find(|f| f.id == id)
            .unwrap_or(&self.families[0])
    }

    /// Which family a product belongs to, if it is in the catalog at all.
    pub fn family_of(&self, product_id: &str) -> Option<FamilyId> {
        self.families
            .iter()
            .find(|f| f.product(product_id).is_some())
            .map(|f| f.id)
    }

    pub fn product_label(&self, product_id: &str) -> Option<&str> {
        self.families
            .iter()
            .find_map(|f| f.product(product_id))
            .map(|p| p.label.as_str())
    }

    pub fn attribute_set(&self, kind: AttributeKind) -> &AttributeSet {
        match kind {
            AttributeKind::WrapColor => &self.wrap_colors,
            AttributeKind::BouquetFilling => &self.fillings,
            AttributeKind::SetFilling => &self.set_fillings,
            AttributeKind::RibbonColor => &self.ribbon_colors,
        }
    }

    pub fn option_label(&self, kind: AttributeKind, id: &str) -> Option<&str> {
        self.attribute_set(kind).label(id)
    }

    /// Fillings a set product may be ordered with, in rule order. May be
    /// empty, in which case the product cannot be ordered right now.
    pub fn eligible_set_fillings(&self, product_id: &str) -> Vec<&AttributeOption> {
        match self
            .set_filling_rules
            .iter()
            .find(|(p, _)| p.as_str() == product_id)
        {
            Some((_, allowed)) => allowed
                .iter()
                .filter_map(|id| self.set_fillings.option(id))
                .collect(),
            None => self.set_fillings.options.iter().collect(),
        }
    }

    pub fn wrap_overview(&self) -> Option<&ImageRef> {
        self.wrap_overview.as_ref()
    }

    pub fn ribbon_overview(&self) -> Option<&ImageRef> {
        self.ribbon_overview.as_ref()
    }
}

fn products(entries: &[(&str, &str)]) -> Vec<Product> {
    entries
        .iter()
        .map(|(id, label)| Product {
            id: (*id).to_string(),
            label: (*label).to_string(),
        })
        .collect()
}

fn attribute_set(kind: AttributeKind, entries: &[(&str, &str)]) -> AttributeSet {
    AttributeSet {
        kind,
        options: entries
            .iter()
            .map(|(id, label)| AttributeOption {
                id: (*id).to_string(),
                label: (*label).to_string(),
            })
            .collect(),
    }
}

fn rule(product_id: &str, filling_ids: &[&str]) -> (String, Vec<String>) {
    (
        product_id.to_string(),
        filling_ids.iter().map(|id| (*id).to_string()).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::standard("no-such-photos-dir")
    }

    #[test]
    fn standard_catalog_has_expected_shape() {
        let catalog = catalog();
        assert_eq!(catalog.families().len(), 2);
        assert_eq!(catalog.family(FamilyId::Bouquets).products.len(), 4);
        assert_eq!(catalog.family(FamilyId::Sets).products.len(), 4);
        assert_eq!(catalog.attribute_set(AttributeKind::WrapColor).options.len(), 7);
        assert_eq!(catalog.attribute_set(AttributeKind::BouquetFilling).options.len(), 4);
        assert_eq!(catalog.attribute_set(AttributeKind::SetFilling).options.len(), 6);
        assert_eq!(catalog.attribute_set(AttributeKind::RibbonColor).options.len(), 16);
    }

    #[test]
    fn menu_order_follows_catalog_order() {
        let catalog = catalog();
        let bouquets: Vec<&str> = catalog
            .family(FamilyId::Bouquets)
            .products
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(bouquets, ["b1", "b2", "b3", "b4"]);

        let wraps: Vec<&str> = catalog
            .attribute_set(AttributeKind::WrapColor)
            .options
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(
            wraps,
            ["black", "white-blue", "newhite", "negreen", "pink", "blue", "darkgreen"]
        );
    }

    #[test]
    fn family_of_resolves_both_families() {
        let catalog = catalog();
        assert_eq!(catalog.family_of("b2"), Some(FamilyId::Bouquets));
        assert_eq!(catalog.family_of("s4"), Some(FamilyId::Sets));
        assert_eq!(catalog.family_of("zz"), None);
    }

    #[test]
    fn option_label_lookup() {
        let catalog = catalog();
        assert_eq!(
            catalog.option_label(AttributeKind::WrapColor, "pink"),
            Some("Розовая")
        );
        assert_eq!(
            catalog.option_label(AttributeKind::RibbonColor, "burgundy"),
            Some("Бордовая")
        );
        assert_eq!(catalog.option_label(AttributeKind::WrapColor, "plaid"), None);
    }

    #[test]
    fn set_filling_rules_constrain_eligibility() {
        let catalog = catalog();

        let s1: Vec<&str> = catalog
            .eligible_set_fillings("s1")
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(s1, ["sweetS", "sourS", "sweet-sourS"]);

        let s3: Vec<&str> = catalog
            .eligible_set_fillings("s3")
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(s3, ["lacritsaS", "sweet-lacritsaS"]);

        let s4: Vec<&str> = catalog
            .eligible_set_fillings("s4")
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(s4, ["spicy-lacritsaS"]);
    }

    #[test]
    fn product_without_rule_accepts_all_fillings() {
        let catalog = catalog();
        assert_eq!(catalog.eligible_set_fillings("s9").len(), 6);
    }

    #[test]
    fn unknown_rule_entries_are_skipped() {
        let mut catalog = catalog();
        catalog
            .set_filling_rules
            .push(("s9".to_string(), vec!["sweetS".to_string(), "ghost".to_string()]));

        let s9: Vec<&str> = catalog
            .eligible_set_fillings("s9")
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(s9, ["sweetS"]);
    }

    #[test]
    fn missing_photos_resolve_to_none() {
        let catalog = catalog();
        assert!(catalog.wrap_overview().is_none());
        assert!(catalog.ribbon_overview().is_none());
    }
}
