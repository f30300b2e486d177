use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{AttributeKind, AttributeOption, Catalog, FamilyId};
use crate::draft::{FlowState, OrderDraft};
use crate::error::Result;
use crate::event::{Event, Selection};
use crate::order::{OrderDetails, OrderRecord};
use crate::render::RenderDirective;

const TEXT_GREETING: &str = "Здравствуйте!";
const PROMPT_FAMILY: &str = "Выберите, что вас интересует:";
const PROMPT_PRODUCT: &str = "Выберите позицию:";
const PROMPT_WRAP: &str = "🎀 Выберите цвет обёртки:";
const PROMPT_FILLING: &str = "🌿 Выберите наполнение букета:";
const PROMPT_SET_FILLING: &str = "🍬 Выберите наполнение набора:";
const PROMPT_RIBBON: &str = "🎀 Выберите цвет подарочной ленты:";
const PROMPT_COLOR_PREFS: &str =
    "🎨 Напишите пожелания по цветовой палитре (например: «Нежные пастельные тона»):";
const PROMPT_BOUQUET_PRICE: &str = "💰 Укажите желаемую цену букета (не менее 1000руб!):";
const PROMPT_SET_PRICE: &str = "💰 Укажите желаемую цену набора (не менее 500 руб):";
const LABEL_BACK_TO_FAMILIES: &str = "← Назад к категориям";
const LABEL_CONFIRM: &str = "✅ Да, всё верно";
const LABEL_RESTART: &str = "❌ Начать заново";
const TEXT_ACCEPTED: &str = "✅ Ваш заказ принят!\nМенеджер свяжется с вами в ближайшее время.";
const TEXT_RESTART_HINT: &str = "Чтобы начать заново, отправьте команду /start.";
const TEXT_CANCELLED: &str = "Заказ отменён. Отправьте /start, чтобы начать заново.";
const TEXT_SESSION_ERROR: &str = "Ошибка. Начните с /start.";
const TEXT_DEAD_END: &str = "❌ Нет доступных вариантов наполнения.";

/// What the session loop should do after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepAction {
    /// Keep the session; the dialogue waits for the next event.
    WaitForInput,
    /// The order was confirmed. The session is finished and the record must
    /// be handed to the notification sink.
    Complete(Box<OrderRecord>),
    /// The session is finished without an order.
    Discard,
}

/// Outcome of one transition: optionally something to show, plus the fate of
/// the session. `directive: None` means the event was ignored entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub directive: Option<RenderDirective>,
    pub action: StepAction,
}

impl StepResult {
    fn prompt(directive: RenderDirective) -> Self {
        Self {
            directive: Some(directive),
            action: StepAction::WaitForInput,
        }
    }

    fn ignored() -> Self {
        Self {
            directive: None,
            action: StepAction::WaitForInput,
        }
    }

    fn discard(directive: RenderDirective) -> Self {
        Self {
            directive: Some(directive),
            action: StepAction::Discard,
        }
    }

    fn complete(directive: RenderDirective, record: OrderRecord) -> Self {
        Self {
            directive: Some(directive),
            action: StepAction::Complete(Box::new(record)),
        }
    }
}

/// The dialogue's transition function over an immutable catalog.
///
/// `step` mutates only the given draft and performs no I/O, so a session's
/// whole behavior is decided by (state, event) and can be tested without any
/// transport. Every selection is validated against the catalog before it is
/// recorded; an option id the current screen never offered re-prompts the
/// same screen and changes nothing.
pub struct FlowEngine {
    catalog: Arc<Catalog>,
}

impl FlowEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn step(&self, draft: &mut OrderDraft, event: &Event) -> Result<StepResult> {
        match event {
            Event::Start => {
                draft.restart();
                Ok(StepResult::prompt(self.family_screen(true)))
            }
            Event::Cancel => Ok(StepResult::discard(Self::cancelled_screen())),
            Event::Select(selection) => self.on_selection(draft, selection),
            Event::Text(text) => self.on_text(draft, text),
        }
    }

    fn on_selection(&self, draft: &mut OrderDraft, selection: &Selection) -> Result<StepResult> {
        match (draft.state, selection) {
            (FlowState::ChoosingFamily, Selection::Family(family)) => {
                draft.select_family(*family);
                draft.state = FlowState::ChoosingProduct;
                Ok(StepResult::prompt(self.product_screen(*family, PROMPT_PRODUCT)))
            }

            (FlowState::ChoosingProduct, Selection::BackToFamilies) => {
                draft.clear_family();
                draft.state = FlowState::ChoosingFamily;
                Ok(StepResult::prompt(self.family_screen(false)))
            }
            (FlowState::ChoosingProduct, Selection::Product(product_id)) => {
                let family = draft.require_family()?;
                let Some(product) = self.catalog.family(family).product(product_id) else {
                    debug!(product = %product_id, %family, "product not in family, re-prompting");
                    return self.reprompt(draft);
                };
                let label = product.label.clone();
                draft.select_product(product_id.clone(), label);

                match family {
                    FamilyId::Bouquets => {
                        draft.state = FlowState::ChoosingWrapColor;
                        Ok(StepResult::prompt(self.wrap_screen()))
                    }
                    FamilyId::Sets => {
                        let eligible = self.catalog.eligible_set_fillings(product_id);
                        if eligible.is_empty() {
                            debug!(product = %product_id, "no eligible fillings, ending session");
                            return Ok(StepResult::discard(Self::dead_end_screen()));
                        }
                        draft.state = FlowState::ChoosingSetFilling;
                        Ok(StepResult::prompt(self.set_filling_screen(&eligible)))
                    }
                }
            }

            (FlowState::ChoosingWrapColor, Selection::BackToProducts(FamilyId::Bouquets)) => {
                draft.clear_product();
                draft.state = FlowState::ChoosingProduct;
                Ok(StepResult::prompt(self.reselect_screen(FamilyId::Bouquets)))
            }
            (FlowState::ChoosingWrapColor, Selection::WrapColor(id)) => {
                match self.catalog.option_label(AttributeKind::WrapColor, id) {
                    Some(label) => {
                        draft.wrap_color = Some(label.to_string());
                        draft.state = FlowState::ChoosingFilling;
                        Ok(StepResult::prompt(self.filling_screen()))
                    }
                    None => self.reprompt(draft),
                }
            }

            (FlowState::ChoosingFilling, Selection::BackToProducts(FamilyId::Bouquets)) => {
                draft.state = FlowState::ChoosingProduct;
                Ok(StepResult::prompt(self.reselect_screen(FamilyId::Bouquets)))
            }
            (FlowState::ChoosingFilling, Selection::BouquetFilling(id)) => {
                match self.catalog.option_label(AttributeKind::BouquetFilling, id) {
                    Some(label) => {
                        draft.filling = Some(label.to_string());
                        draft.state = FlowState::ChoosingBouquetRibbon;
                        Ok(StepResult::prompt(self.ribbon_screen(FamilyId::Bouquets)))
                    }
                    None => self.reprompt(draft),
                }
            }

            (FlowState::ChoosingBouquetRibbon, Selection::BackToProducts(FamilyId::Bouquets)) => {
                draft.state = FlowState::ChoosingProduct;
                Ok(StepResult::prompt(self.reselect_screen(FamilyId::Bouquets)))
            }
            (FlowState::ChoosingBouquetRibbon, Selection::BouquetRibbon(id)) => {
                match self.catalog.option_label(AttributeKind::RibbonColor, id) {
                    Some(label) => {
                        draft.ribbon_color = Some(label.to_string());
                        draft.state = FlowState::TypingColorPreferences;
                        Ok(StepResult::prompt(self.prefs_screen()))
                    }
                    None => self.reprompt(draft),
                }
            }

            (FlowState::ChoosingSetFilling, Selection::BackToProducts(FamilyId::Sets)) => {
                draft.state = FlowState::ChoosingProduct;
                Ok(StepResult::prompt(self.reselect_screen(FamilyId::Sets)))
            }
            (FlowState::ChoosingSetFilling, Selection::SetFilling(id)) => {
                let product_id = draft.require_product()?.to_string();
                let eligible = self.catalog.eligible_set_fillings(&product_id);
                let Some(option) = eligible.iter().find(|o| o.id == *id) else {
                    debug!(product = %product_id, filling = %id, "filling not eligible, re-prompting");
                    return self.reprompt(draft);
                };
                draft.set_filling = Some(option.label.clone());
                draft.state = FlowState::ChoosingSetRibbon;
                Ok(StepResult::prompt(self.ribbon_screen(FamilyId::Sets)))
            }

            (FlowState::ChoosingSetRibbon, Selection::BackToProducts(FamilyId::Sets)) => {
                draft.state = FlowState::ChoosingProduct;
                Ok(StepResult::prompt(self.reselect_screen(FamilyId::Sets)))
            }
            (FlowState::ChoosingSetRibbon, Selection::SetRibbon(id)) => {
                match self.catalog.option_label(AttributeKind::RibbonColor, id) {
                    Some(label) => {
                        draft.ribbon_color = Some(label.to_string());
                        draft.state = FlowState::TypingSetPrice;
                        Ok(StepResult::prompt(self.set_price_screen()))
                    }
                    None => self.reprompt(draft),
                }
            }

            (FlowState::Confirming, Selection::Confirm) => {
                let record = self.finalize(draft)?;
                Ok(StepResult::complete(Self::accepted_screen(), record))
            }
            (FlowState::Confirming, Selection::Restart) => {
                Ok(StepResult::discard(Self::restart_screen()))
            }

            // Free-text steps offer no options; stray taps change nothing.
            (
                FlowState::TypingColorPreferences
                | FlowState::TypingBouquetPrice
                | FlowState::TypingSetPrice,
                _,
            ) => Ok(StepResult::ignored()),

            _ => self.reprompt(draft),
        }
    }

    fn on_text(&self, draft: &mut OrderDraft, text: &str) -> Result<StepResult> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(StepResult::ignored());
        }

        match draft.state {
            FlowState::TypingColorPreferences => {
                draft.color_preferences = Some(text.to_string());
                draft.state = FlowState::TypingBouquetPrice;
                Ok(StepResult::prompt(self.bouquet_price_screen()))
            }
            // Any text counts as a price; people answer with ranges and
            // comments, and the operator reads it as written.
            FlowState::TypingBouquetPrice | FlowState::TypingSetPrice => {
                draft.price = Some(trimmed.to_string());
                draft.state = FlowState::Confirming;
                let screen = self.confirm_screen(draft)?;
                Ok(StepResult::prompt(screen))
            }
            _ => Ok(StepResult::ignored()),
        }
    }

    /// Re-emits the canonical screen for the draft's current state.
    fn reprompt(&self, draft: &OrderDraft) -> Result<StepResult> {
        Ok(StepResult::prompt(self.screen_for(draft)?))
    }

    fn screen_for(&self, draft: &OrderDraft) -> Result<RenderDirective> {
        match draft.state {
            FlowState::ChoosingFamily => Ok(self.family_screen(false)),
            FlowState::ChoosingProduct => {
                let family = draft.require_family()?;
                Ok(self.reselect_screen(family))
            }
            FlowState::ChoosingWrapColor => Ok(self.wrap_screen()),
            FlowState::ChoosingFilling => Ok(self.filling_screen()),
            FlowState::ChoosingBouquetRibbon => Ok(self.ribbon_screen(FamilyId::Bouquets)),
            FlowState::ChoosingSetFilling => {
                let product_id = draft.require_product()?;
                let eligible = self.catalog.eligible_set_fillings(product_id);
                Ok(self.set_filling_screen(&eligible))
            }
            FlowState::ChoosingSetRibbon => Ok(self.ribbon_screen(FamilyId::Sets)),
            FlowState::TypingColorPreferences => Ok(self.prefs_screen()),
            FlowState::TypingBouquetPrice => Ok(self.bouquet_price_screen()),
            FlowState::TypingSetPrice => Ok(self.set_price_screen()),
            FlowState::Confirming => self.confirm_screen(draft),
        }
    }

    fn confirm_screen(&self, draft: &OrderDraft) -> Result<RenderDirective> {
        let summary = match draft.require_family()? {
            FamilyId::Bouquets => format!(
                "📦 Вы выбрали:\n\n\
                 • Товар: {}\n\
                 • Обёртка: {}\n\
                 • Наполнение: {}\n\
                 • Лента: {}\n\
                 • Палитра: _{}_\n\
                 • Желаемая цена: {}\n\n\
                 ✅ Подтвердить заказ?",
                draft.require_product_label()?,
                draft.require_wrap_color()?,
                draft.require_filling()?,
                draft.require_ribbon_color()?,
                draft.require_color_preferences()?,
                draft.require_price()?,
            ),
            FamilyId::Sets => format!(
                "📦 Вы выбрали:\n\n\
                 • Товар: {}\n\
                 • Наполнение: {}\n\
                 • Лента: {}\n\
                 • Желаемая цена: {}\n\n\
                 ✅ Подтвердить заказ?",
                draft.require_product_label()?,
                draft.require_set_filling()?,
                draft.require_ribbon_color()?,
                draft.require_price()?,
            ),
        };

        Ok(RenderDirective::message(summary)
            .choice(LABEL_CONFIRM, &Selection::Confirm)
            .choice(LABEL_RESTART, &Selection::Restart)
            .markdown())
    }

    fn finalize(&self, draft: &OrderDraft) -> Result<OrderRecord> {
        let family = draft.require_family()?;
        let details = match family {
            FamilyId::Bouquets => OrderDetails::Bouquet {
                wrap_color: draft.require_wrap_color()?.to_string(),
                filling: draft.require_filling()?.to_string(),
                ribbon_color: draft.require_ribbon_color()?.to_string(),
                color_preferences: draft.require_color_preferences()?.to_string(),
            },
            FamilyId::Sets => OrderDetails::Set {
                filling: draft.require_set_filling()?.to_string(),
                ribbon_color: draft.require_ribbon_color()?.to_string(),
            },
        };

        Ok(OrderRecord {
            user: draft.profile.clone(),
            family,
            product: draft.require_product_label()?.to_string(),
            details,
            price: draft.require_price()?.to_string(),
            created_at: Utc::now(),
        })
    }

    fn family_screen(&self, entry: bool) -> RenderDirective {
        let mut screen = if entry {
            RenderDirective::message(format!("{TEXT_GREETING}\n\n{PROMPT_FAMILY}"))
        } else {
            RenderDirective::message(PROMPT_FAMILY).replace_previous()
        };
        for family in self.catalog.families() {
            screen = screen.choice(family.label.clone(), &Selection::Family(family.id));
        }
        // The family buttons share one row; every other menu is a column.
        screen.columns(2)
    }

    fn product_screen(&self, family_id: FamilyId, prompt: &str) -> RenderDirective {
        let family = self.catalog.family(family_id);
        let mut screen = RenderDirective::message(prompt).replace_previous();
        for product in &family.products {
            screen = screen.choice(product.label.clone(), &Selection::Product(product.id.clone()));
        }
        screen.choice(LABEL_BACK_TO_FAMILIES, &Selection::BackToFamilies)
    }

    /// Product menu as shown after back-navigation, with the family's own
    /// prompt instead of the generic one.
    fn reselect_screen(&self, family_id: FamilyId) -> RenderDirective {
        let family = self.catalog.family(family_id);
        self.product_screen(family_id, &family.reselect_prompt)
    }

    fn wrap_screen(&self) -> RenderDirective {
        let mut screen = RenderDirective::message(PROMPT_WRAP)
            .with_image(self.catalog.wrap_overview().cloned())
            .replace_previous();
        for option in &self.catalog.attribute_set(AttributeKind::WrapColor).options {
            screen = screen.choice(option.label.clone(), &Selection::WrapColor(option.id.clone()));
        }
        screen.choice(
            self.catalog.family(FamilyId::Bouquets).back_label.clone(),
            &Selection::BackToProducts(FamilyId::Bouquets),
        )
    }

    fn filling_screen(&self) -> RenderDirective {
        let mut screen = RenderDirective::message(PROMPT_FILLING).replace_previous();
        for option in &self.catalog.attribute_set(AttributeKind::BouquetFilling).options {
            screen = screen.choice(
                option.label.clone(),
                &Selection::BouquetFilling(option.id.clone()),
            );
        }
        screen.choice(
            self.catalog.family(FamilyId::Bouquets).back_label.clone(),
            &Selection::BackToProducts(FamilyId::Bouquets),
        )
    }

    fn set_filling_screen(&self, eligible: &[&AttributeOption]) -> RenderDirective {
        let mut screen = RenderDirective::message(PROMPT_SET_FILLING).replace_previous();
        for option in eligible {
            screen = screen.choice(option.label.clone(), &Selection::SetFilling(option.id.clone()));
        }
        screen.choice(
            self.catalog.family(FamilyId::Sets).back_label.clone(),
            &Selection::BackToProducts(FamilyId::Sets),
        )
    }

    fn ribbon_screen(&self, family_id: FamilyId) -> RenderDirective {
        let mut screen = RenderDirective::message(PROMPT_RIBBON)
            .with_image(self.catalog.ribbon_overview().cloned())
            .replace_previous();
        for option in &self.catalog.attribute_set(AttributeKind::RibbonColor).options {
            let selection = match family_id {
                FamilyId::Bouquets => Selection::BouquetRibbon(option.id.clone()),
                FamilyId::Sets => Selection::SetRibbon(option.id.clone()),
            };
            screen = screen.choice(option.label.clone(), &selection);
        }
        screen.choice(
            self.catalog.family(family_id).back_label.clone(),
            &Selection::BackToProducts(family_id),
        )
    }

    fn prefs_screen(&self) -> RenderDirective {
        RenderDirective::message(PROMPT_COLOR_PREFS).replace_previous()
    }

    fn bouquet_price_screen(&self) -> RenderDirective {
        RenderDirective::message(PROMPT_BOUQUET_PRICE)
    }

    fn set_price_screen(&self) -> RenderDirective {
        RenderDirective::message(PROMPT_SET_PRICE).replace_previous()
    }

    fn accepted_screen() -> RenderDirective {
        RenderDirective::message(TEXT_ACCEPTED).replace_previous()
    }

    fn restart_screen() -> RenderDirective {
        RenderDirective::message(TEXT_RESTART_HINT).replace_previous()
    }

    fn dead_end_screen() -> RenderDirective {
        RenderDirective::message(TEXT_DEAD_END).replace_previous()
    }

    /// Shown on the abort command, whether or not a session existed.
    pub fn cancelled_screen() -> RenderDirective {
        RenderDirective::message(TEXT_CANCELLED)
    }

    /// Shown when an event arrives for a user with no active session.
    pub fn missing_session_screen() -> RenderDirective {
        RenderDirective::message(TEXT_RESTART_HINT)
    }

    /// Shown when a session had to be discarded because its draft was
    /// missing data its state requires.
    pub fn session_error_screen() -> RenderDirective {
        RenderDirective::message(TEXT_SESSION_ERROR).replace_previous()
    }
}
