//! Function configuration read from environment variables.
use std::time::Duration;

use crate::error::AppError;
use crate::pricing::{ExclusionRule, InstallationMode, LayoutConfig};

const DEFAULT_EXCLUDED_ARTICLES: &str = "9000-9999";

/// DejaVu Sans covers Cyrillic, which builtin PDF fonts do not.
const DEFAULT_FONT_URL: &str = "https://cdn.jsdelivr.net/npm/dejavu-fonts-ttf@2.37.3/ttf/DejaVuSans.ttf";

const DEFAULT_TERMS: [&str; 3] = [
    "Оборудование имеет сертификат соответствия ТС ЕАЭС 042-2017",
    "Срок действия коммерческого предложения 15 дней",
    "Срок изготовления оборудования 30 дней",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub offer: OfferSettings,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct OfferSettings {
    pub installation_mode: InstallationMode,
    pub clamp_discount: bool,
    pub exclusions: Vec<ExclusionRule>,
    pub layout: LayoutConfig,
    pub counter_table: String,
    /// Generated documents are copied here when set.
    pub archive_bucket: Option<String>,
    pub logo_url: Option<String>,
    /// TTF used by the PDF renderer. `none` selects builtin Helvetica.
    pub font_url: Option<String>,
    pub image_timeout: Duration,
    pub company: CompanyProfile,
}

/// Seller block printed in the document header and footer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    pub details: Vec<String>,
    pub website: Option<String>,
    pub signatory: String,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Notification inbox; the SMTP account itself when unset.
    pub recipient: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let installation_mode = match get("OFFER_INSTALLATION_MODE") {
            Some(v) => v.parse().map_err(|e| invalid("OFFER_INSTALLATION_MODE", e))?,
            None => InstallationMode::default(),
        };

        let clamp_discount = match get("OFFER_CLAMP_DISCOUNT") {
            Some(v) => v.parse::<bool>().map_err(|e| invalid("OFFER_CLAMP_DISCOUNT", e))?,
            None => false,
        };

        let exclusions = get("OFFER_EXCLUDED_ARTICLES")
            .unwrap_or_else(|| DEFAULT_EXCLUDED_ARTICLES.to_string())
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| part.parse::<ExclusionRule>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid("OFFER_EXCLUDED_ARTICLES", e))?;

        let defaults = LayoutConfig::default();
        let layout = LayoutConfig::new(
            parse_number(&get, "OFFER_FIRST_PAGE_ROWS", defaults.first_page_rows)?,
            parse_number(&get, "OFFER_PAGE_ROWS", defaults.page_rows)?,
            parse_number(&get, "OFFER_MIN_TRAILING_ROWS", defaults.min_trailing_rows)?,
        )?;

        let company = CompanyProfile {
            name: get("OFFER_COMPANY_NAME").unwrap_or_else(|| "URBAN PLAY".to_string()),
            details: split_lines(get("OFFER_COMPANY_DETAILS")),
            website: get("OFFER_COMPANY_WEBSITE"),
            signatory: get("OFFER_SIGNATORY").unwrap_or_default(),
            terms: match get("OFFER_TERMS") {
                Some(terms) => split_lines(Some(terms)),
                None => DEFAULT_TERMS.iter().map(|t| t.to_string()).collect(),
            },
        };

        let offer = OfferSettings {
            installation_mode,
            clamp_discount,
            exclusions,
            layout,
            counter_table: get("OFFER_COUNTER_TABLE").unwrap_or_else(|| "Config".to_string()),
            archive_bucket: get("OFFER_ARCHIVE_BUCKET"),
            logo_url: get("OFFER_LOGO_URL"),
            font_url: match get("OFFER_FONT_URL") {
                Some(url) if url.eq_ignore_ascii_case("none") => None,
                Some(url) => Some(url),
                None => Some(DEFAULT_FONT_URL.to_string()),
            },
            image_timeout: Duration::from_secs(parse_number(&get, "OFFER_IMAGE_TIMEOUT_SECS", 10)?),
            company,
        };

        let smtp = SmtpConfig {
            host: get("SMTP_HOST").unwrap_or_else(|| "smtp.yandex.ru".to_string()),
            port: get("SMTP_PORT").map_or(587, |v| parse_port(&v)),
            user: get("SMTP_USER"),
            password: get("SMTP_PASSWORD"),
            recipient: get("NOTIFY_EMAIL_TO"),
        };

        Ok(Config { offer, smtp })
    }
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> AppError {
    AppError::Configuration(format!("{} is invalid: {}", key, reason))
}

fn parse_number<G, T>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(v) => v.parse::<T>().map_err(|e| invalid(key, e)),
        None => Ok(default),
    }
}

/// Ports are sometimes pasted with stray characters; keep the digits.
fn parse_port(raw: &str) -> u16 {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(587)
}

fn split_lines(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(';')
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
