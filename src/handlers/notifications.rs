//! Order and callback notification e-mails.
use askama::Template;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::config::SmtpConfig;
use crate::error::AppError;
use crate::models::{CallbackRequest, NotificationResponse, OrderEmailRequest};
use crate::pricing::money::{format_money, parse_amount, parse_optional_amount, parse_quantity};

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    /// STARTTLS relay authenticated as `SMTP_USER`, which is also the sender.
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let (Some(user), Some(password)) = (&config.user, &config.password) else {
            return Err(AppError::Configuration("SMTP credentials not configured".to_string()));
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Configuration(format!("Failed to create SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(user.clone(), password.clone()))
            .build();

        let from: Mailbox = user
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = config
            .recipient
            .as_deref()
            .unwrap_or(user)
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid recipient address: {}", e)))?;

        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| AppError::Email(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;
        Ok(())
    }
}

fn require(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn rubles(amount: Decimal) -> String {
    format!("{} ₽", format_money(amount))
}

/// Rubles, or an empty string that hides the row.
fn optional_rubles(amount: Decimal) -> String {
    if amount > Decimal::ZERO { rubles(amount) } else { String::new() }
}

fn too_large(what: &str) -> AppError {
    AppError::invalid(format!("The {} of the order is too large", what))
}

/// Russian label for the storefront's legal status codes.
pub fn legal_status_label(code: &str) -> &str {
    match code {
        "individual" => "Физическое лицо",
        "entrepreneur" => "Индивидуальный предприниматель",
        "legal" => "Юридическое лицо",
        "government" => "Государственная организация",
        "education" => "Образовательное учреждение",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OrderLine {
    position: usize,
    name: String,
    article: String,
    price: String,
    quantity: u32,
    sum: String,
}

#[derive(Template)]
#[template(path = "email/order.html")]
struct OrderEmailHtml<'a> {
    title: &'a str,
    name: &'a str,
    phone: &'a str,
    email: &'a str,
    address: &'a str,
    legal_status: &'a str,
    comment: &'a str,
    lines: Vec<OrderLine>,
    items_total: String,
    installation: String,
    delivery: String,
    grand_total: String,
}

#[derive(Template)]
#[template(path = "email/callback.html")]
struct CallbackEmailHtml<'a> {
    title: &'a str,
    name: &'a str,
    phone: &'a str,
    email: &'a str,
    city: &'a str,
    legal_status: &'a str,
    comment: &'a str,
}

/// Cart lines with their sums, and the items total.
fn order_lines(request: &OrderEmailRequest) -> Result<(Vec<OrderLine>, Decimal), AppError> {
    let mut lines = Vec::with_capacity(request.cart_items.len());
    let mut items_total = Decimal::ZERO;
    for (idx, item) in request.cart_items.iter().enumerate() {
        let position = idx + 1;
        let price = parse_amount(&item.price, &format!("price of cart item {}", position))?;
        let quantity = parse_quantity(item.quantity.as_ref(), position)?;
        let sum = price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| AppError::invalid(format!("Sum of cart item {} is too large", position)))?;
        items_total = items_total.checked_add(sum).ok_or_else(|| too_large("items total"))?;
        lines.push(OrderLine {
            position,
            name: item.name.clone(),
            article: item.article.clone().unwrap_or_else(|| "Н/Д".to_string()),
            price: rubles(price),
            quantity,
            sum: rubles(sum),
        });
    }
    Ok((lines, items_total))
}

/// Order e-mail with the cart table and totals recomputed from the cart.
pub fn build_order_email(request: &OrderEmailRequest) -> Result<OutgoingEmail, AppError> {
    let name = require(&request.name, "name")?;
    let phone = require(&request.phone, "phone")?;
    if request.cart_items.is_empty() {
        return Err(AppError::invalid("cartItems must not be empty"));
    }
    let order_number = request.order_number.as_deref().unwrap_or("N/A");

    let (lines, items_total) = order_lines(request)?;
    let installation = parse_optional_amount(request.installation_cost.as_ref(), "installationCost")?;
    let delivery = parse_optional_amount(request.delivery_cost.as_ref(), "deliveryCost")?;
    let grand_total = items_total
        .checked_add(installation)
        .and_then(|v| v.checked_add(delivery))
        .ok_or_else(|| too_large("total"))?;

    let title = format!("Новый заказ #{}", order_number);
    let html = OrderEmailHtml {
        title: &title,
        name: &name,
        phone: &phone,
        email: request.email.as_deref().unwrap_or(""),
        address: request.address.as_deref().unwrap_or(""),
        legal_status: legal_status_label(request.legal_status.as_deref().unwrap_or("")),
        comment: request.comment.as_deref().map(str::trim).unwrap_or(""),
        lines,
        items_total: rubles(items_total),
        installation: optional_rubles(installation),
        delivery: optional_rubles(delivery),
        grand_total: rubles(grand_total),
    }
    .render()?;

    Ok(OutgoingEmail {
        subject: format!("Новый заказ #{} от {}", order_number, name),
        html,
    })
}

pub fn build_callback_email(request: &CallbackRequest) -> Result<OutgoingEmail, AppError> {
    let name = require(&request.name, "name")?;
    let phone = require(&request.phone, "phone")?;

    let html = CallbackEmailHtml {
        title: "Новая заявка на обратный звонок",
        name: &name,
        phone: &phone,
        email: request.email.as_deref().unwrap_or(""),
        city: request.city.as_deref().unwrap_or(""),
        legal_status: legal_status_label(request.status.as_deref().unwrap_or("")),
        comment: request.comment.as_deref().map(str::trim).unwrap_or(""),
    }
    .render()?;

    Ok(OutgoingEmail {
        subject: format!("Заявка на обратный звонок от {}", name),
        html,
    })
}

fn sent() -> Value {
    json!(NotificationResponse {
        success: true,
        message: "Email sent successfully".to_string(),
    })
}

pub async fn handle_send_order(request: OrderEmailRequest, mailer: &dyn Mailer) -> Result<Value, AppError> {
    let email = build_order_email(&request)?;
    mailer.send(&email).await?;
    tracing::info!(order_number = request.order_number.as_deref().unwrap_or("N/A"), "Order email sent");
    Ok(sent())
}

pub async fn handle_send_callback(request: CallbackRequest, mailer: &dyn Mailer) -> Result<Value, AppError> {
    let email = build_callback_email(&request)?;
    mailer.send(&email).await?;
    tracing::info!("Callback request email sent");
    Ok(sent())
}
