use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::config::OfferSettings;
use crate::error::AppError;
use crate::pricing::money::{parse_amount, parse_optional_amount, parse_percent, parse_quantity, RawAmount};
use crate::pricing::{Discount, InstallationMode, LineItem, OrderContext};

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub name: String,
    pub price: Option<RawAmount>,
    #[serde(default)]
    pub quantity: Option<Number>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Xlsx,
    Pdf,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

/// Body of `/generate-offer` and `/offer-preview`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    #[serde(default)]
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub installation_percent: Option<RawAmount>,
    #[serde(default)]
    pub installation_cost: Option<RawAmount>,
    #[serde(default)]
    pub installation_mode: Option<InstallationMode>,
    #[serde(default)]
    pub delivery_cost: Option<RawAmount>,
    #[serde(default)]
    pub hide_installation: bool,
    #[serde(default)]
    pub hide_delivery: bool,
    #[serde(default)]
    pub discount_percent: Option<RawAmount>,
    #[serde(default)]
    pub discount_amount: Option<RawAmount>,
    #[serde(default)]
    pub clamp_to_zero: Option<bool>,
    #[serde(default)]
    pub format: Option<DocumentFormat>,
}

impl OfferRequest {
    /// Validate the request and build the pricing input.
    ///
    /// Request values win over configured defaults for the installation mode
    /// and the discount policy. The sequence number is filled in later.
    pub fn into_order(self, settings: &OfferSettings) -> Result<OrderContext, AppError> {
        if self.products.is_empty() {
            return Err(AppError::invalid("At least one product is required"));
        }

        let items = self
            .products
            .into_iter()
            .enumerate()
            .map(|(idx, product)| {
                let position = idx + 1;
                let name = product.name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::invalid(format!("Product {} has no name", position)));
                }
                let price = product
                    .price
                    .as_ref()
                    .ok_or_else(|| AppError::invalid(format!("Product {} has no price", position)))?;
                Ok(LineItem {
                    article: product.article.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
                    unit_price: parse_amount(price, &format!("price of product {}", position))?,
                    quantity: parse_quantity(product.quantity.as_ref(), position)?,
                    image_ref: product.image.filter(|i| !i.trim().is_empty()),
                    name,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let discount = Discount::resolve(
            parse_percent(self.discount_percent.as_ref(), "discountPercent")?,
            parse_optional_amount(self.discount_amount.as_ref(), "discountAmount")?,
        );

        Ok(OrderContext {
            items,
            installation_mode: self.installation_mode.unwrap_or(settings.installation_mode),
            installation_percent: parse_percent(self.installation_percent.as_ref(), "installationPercent")?,
            installation_amount: parse_optional_amount(self.installation_cost.as_ref(), "installationCost")?,
            delivery_amount: parse_optional_amount(self.delivery_cost.as_ref(), "deliveryCost")?,
            hide_installation: self.hide_installation,
            hide_delivery: self.hide_delivery,
            discount,
            clamp_discount: self.clamp_to_zero.unwrap_or(settings.clamp_discount),
            address: self.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            sequence_number: 0,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub name: String,
    #[serde(default)]
    pub article: Option<String>,
    pub price: RawAmount,
    #[serde(default)]
    pub quantity: Option<Number>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderEmailRequest {
    #[serde(default)]
    pub order_number: Option<String>,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub legal_status: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub installation_cost: Option<RawAmount>,
    #[serde(default)]
    pub delivery_cost: Option<RawAmount>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NotificationResponse {
    pub success: bool,
    pub message: String,
}

/// Counter item in the config table.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OfferCounter {
    pub counter_value: u64,
    #[serde(default)]
    pub counter_year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pricing::tests::dec;
    use serde_json::json;

    fn settings() -> OfferSettings {
        Config::from_lookup(|_| None).unwrap().offer
    }

    fn parse(value: serde_json::Value) -> OfferRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_offer_request_into_order() {
        let request = parse(json!({
            "products": [
                { "article": "1001", "name": "Качели", "price": "1 000,50", "quantity": 2, "image": "https://cdn/1.png" },
                { "name": " Горка ", "price": 2000, "quantity": 1 }
            ],
            "installationPercent": "10",
            "deliveryCost": 500,
            "hideDelivery": true,
            "discountAmount": "300",
            "format": "pdf"
        }));
        assert_eq!(request.format, Some(DocumentFormat::Pdf));

        let order = request.into_order(&settings()).unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].unit_price, dec("1000.5"));
        assert_eq!(order.items[1].name, "Горка");
        assert_eq!(order.items[1].article, None);
        assert_eq!(order.installation_mode, InstallationMode::Percent);
        assert_eq!(order.installation_percent, dec("10"));
        assert_eq!(order.delivery_amount, dec("500"));
        assert!(order.hide_delivery);
        assert!(!order.hide_installation);
        assert_eq!(order.discount, Discount::Amount(dec("300")));
        assert!(!order.clamp_discount);
    }

    #[test]
    fn test_request_overrides_configured_policy() {
        let request = parse(json!({
            "products": [{ "name": "Качели", "price": 100, "quantity": 1 }],
            "installationMode": "fixed",
            "installationCost": "750",
            "clampToZero": true
        }));
        let order = request.into_order(&settings()).unwrap();
        assert_eq!(order.installation_mode, InstallationMode::Fixed);
        assert_eq!(order.installation_amount, dec("750"));
        assert!(order.clamp_discount);
    }

    #[test]
    fn test_invalid_products_are_rejected() {
        let empty = parse(json!({ "products": [] }));
        assert!(matches!(empty.into_order(&settings()), Err(AppError::InvalidInput(_))));

        let no_name = parse(json!({ "products": [{ "name": "  ", "price": 1, "quantity": 1 }] }));
        assert!(no_name.into_order(&settings()).is_err());

        let bad_price = parse(json!({ "products": [{ "name": "A", "price": "abc", "quantity": 1 }] }));
        assert!(bad_price.into_order(&settings()).is_err());

        let zero_quantity = parse(json!({ "products": [{ "name": "A", "price": 1, "quantity": 0 }] }));
        assert!(zero_quantity.into_order(&settings()).is_err());

        let big_percent = parse(json!({
            "products": [{ "name": "A", "price": 1, "quantity": 1 }],
            "discountPercent": 150
        }));
        assert!(big_percent.into_order(&settings()).is_err());
    }
}
