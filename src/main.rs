mod archive;
mod config;
mod error;
mod handlers;
mod http;
mod images;
mod models;
mod pricing;
mod render;
mod sequence;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use lambda_http::{run, service_fn, Body, Request, Response};
use serde_json::Value;

use archive::{DocumentArchive, S3Archive};
use config::Config;
use error::AppError;
use handlers::{handle_generate_offer, handle_offer_preview, handle_send_callback, handle_send_order, OfferServices, SmtpMailer};
use http::{document_response, error_response, handle_options, parse_request, success_response};
use images::HttpImageFetcher;
use models::{CallbackRequest, OfferRequest, OrderEmailRequest};
use sequence::DynamoDbSequence;

/// AWS clients shared by every invocation of a warm container.
struct AwsClients {
    dynamodb: DynamoDbClient,
    s3: S3Client,
}

/// Strip /Prod or /prod prefix if it exists
fn strip_stage_prefix(path: &str) -> &str {
    if path.starts_with("/Prod") || path.starts_with("/prod") {
        &path[5..]
    } else {
        path
    }
}

/// Turn a JSON handler result into a response, logging failures.
fn respond(result: Result<Value, AppError>) -> Response<Body> {
    match result {
        Ok(body) => success_response(200, &body.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, status = e.status(), "Request failed");
            e.to_response()
        }
    }
}

/// Handle the Lambda event
async fn handle_lambda_event(event: Request, clients: &AwsClients) -> Response<Body> {
    let method = event.method().as_str();
    let path = strip_stage_prefix(event.uri().path());

    // Handle CORS preflight requests
    if method == "OPTIONS" {
        return handle_options();
    }

    if method != "POST" {
        return error_response(
            400,
            "Invalid HTTP method",
            &format!("Method '{}' is not supported", method),
            Some("Ensure you are calling this Lambda via API Gateway"),
        );
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => return respond(Err(e)),
    };

    match path {
        "/generate-offer" => {
            let request: OfferRequest = match parse_request(event.body()) {
                Ok(request) => request,
                Err(response) => return response,
            };

            let fetcher = match HttpImageFetcher::new(config.offer.image_timeout) {
                Ok(fetcher) => fetcher,
                Err(e) => return respond(Err(e)),
            };
            let sequence = DynamoDbSequence::new(clients.dynamodb.clone(), config.offer.counter_table.clone());
            let archive = config
                .offer
                .archive_bucket
                .as_ref()
                .map(|bucket| S3Archive::new(clients.s3.clone(), bucket.clone()));

            let services = OfferServices {
                settings: &config.offer,
                sequence: &sequence,
                fetcher: &fetcher,
                archive: archive.as_ref().map(|a| a as &dyn DocumentArchive),
            };

            match handle_generate_offer(request, &services, Utc::now()).await {
                Ok(offer) => document_response(offer.bytes, offer.content_type, &offer.filename, offer.offer_number),
                Err(e) => respond(Err(e)),
            }
        }
        "/offer-preview" => {
            let request: OfferRequest = match parse_request(event.body()) {
                Ok(request) => request,
                Err(response) => return response,
            };
            respond(handle_offer_preview(request, &config.offer))
        }
        "/send-order" => {
            let request: OrderEmailRequest = match parse_request(event.body()) {
                Ok(request) => request,
                Err(response) => return response,
            };
            let mailer = match SmtpMailer::new(&config.smtp) {
                Ok(mailer) => mailer,
                Err(e) => return respond(Err(e)),
            };
            respond(handle_send_order(request, &mailer).await)
        }
        "/send-callback" => {
            let request: CallbackRequest = match parse_request(event.body()) {
                Ok(request) => request,
                Err(response) => return response,
            };
            let mailer = match SmtpMailer::new(&config.smtp) {
                Ok(mailer) => mailer,
                Err(e) => return respond(Err(e)),
            };
            respond(handle_send_callback(request, &mailer).await)
        }
        _ => {
            // Method not allowed for other paths
            error_response(
                405,
                "Method not allowed",
                path,
                Some("You're sending a request that doesn't exist."),
            )
        }
    }
}

/// Main Lambda handler function
async fn function_handler(event: Request, clients: &AwsClients) -> Result<Response<Body>, lambda_http::Error> {
    Ok(handle_lambda_event(event, clients).await)
}

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    lambda_http::tracing::init_default_subscriber();

    // Initialize AWS config and clients once per container
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let clients = AwsClients {
        dynamodb: DynamoDbClient::new(&config),
        s3: S3Client::new(&config),
    };

    run(service_fn(|event: Request| function_handler(event, &clients))).await
}
