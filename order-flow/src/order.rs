use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::FamilyId;
use crate::draft::UserProfile;

/// Path-specific attributes of a finalized order. Keeping the two shapes as
/// enum variants makes a record that mixes bouquet and set fields
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderDetails {
    Bouquet {
        wrap_color: String,
        filling: String,
        ribbon_color: String,
        color_preferences: String,
    },
    Set {
        filling: String,
        ribbon_color: String,
    },
}

/// A confirmed order, produced exactly once per session at the moment the
/// user confirms. All attribute values are display labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub user: UserProfile,
    pub family: FamilyId,
    pub product: String,
    pub details: OrderDetails,
    pub price: String,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// The operator notification, Markdown formatted. The layout is what the
    /// shop's managers already parse by eye, so it changes only deliberately.
    pub fn operator_message(&self) -> String {
        let details = match &self.details {
            OrderDetails::Bouquet {
                wrap_color,
                filling,
                ribbon_color,
                color_preferences,
            } => format!(
                "Товар: {}\nОбёртка: {}\nНаполнение: {}\nЛента: {}\nПалитра: _{}_\nЖелаемая цена: {}\n",
                self.product, wrap_color, filling, ribbon_color, color_preferences, self.price
            ),
            OrderDetails::Set {
                filling,
                ribbon_color,
            } => format!(
                "Товар: {}\nНаполнение: {}\nЛента: {}\nЖелаемая цена: {}\n",
                self.product, filling, ribbon_color, self.price
            ),
        };

        format!(
            "📦 *Новый заказ!*\n\nПользователь: {} (@{})\nID: `{}`\n\n{}",
            self.user.full_name,
            self.user.username.as_deref().unwrap_or("нет"),
            self.user.id,
            details
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bouquet_operator_message_lists_every_attribute() {
        let record = OrderRecord {
            user: UserProfile::new("99", "Анна Иванова").with_username("anna"),
            family: FamilyId::Bouquets,
            product: "Букет на день рождения🥳".to_string(),
            details: OrderDetails::Bouquet {
                wrap_color: "Розовая".to_string(),
                filling: "Сладкий букет🥹".to_string(),
                ribbon_color: "Бордовая".to_string(),
                color_preferences: "пастельные тона".to_string(),
            },
            price: "1500".to_string(),
            created_at: Utc::now(),
        };

        assert_eq!(
            record.operator_message(),
            "📦 *Новый заказ!*\n\n\
             Пользователь: Анна Иванова (@anna)\n\
             ID: `99`\n\n\
             Товар: Букет на день рождения🥳\n\
             Обёртка: Розовая\n\
             Наполнение: Сладкий букет🥹\n\
             Лента: Бордовая\n\
             Палитра: _пастельные тона_\n\
             Желаемая цена: 1500\n"
        );
    }

    #[test]
    fn set_operator_message_omits_bouquet_fields() {
        let record = OrderRecord {
            user: UserProfile::new("7", "Пётр"),
            family: FamilyId::Sets,
            product: "Набор 'Самый смелый' с добавлением острого мармелада🔥".to_string(),
            details: OrderDetails::Set {
                filling: "Острый набор с лакрицей🔥".to_string(),
                ribbon_color: "Ferrari".to_string(),
            },
            price: "700".to_string(),
            created_at: Utc::now(),
        };

        let message = record.operator_message();
        assert!(message.contains("(@нет)"));
        assert!(message.contains("ID: `7`"));
        assert!(message.contains("Наполнение: Острый набор с лакрицей🔥\n"));
        assert!(!message.contains("Обёртка"));
        assert!(!message.contains("Палитра"));
    }
}
