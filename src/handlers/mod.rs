//! Handler modules for Lambda function

pub mod notifications;
pub mod offers;

// Re-export handler functions for convenience
pub use notifications::{handle_send_callback, handle_send_order, SmtpMailer};
pub use offers::{handle_generate_offer, handle_offer_preview, OfferServices};
