use crate::api::{self, Delivery, Mode};
use crate::commands::{settings_store, Out};
use crate::controller::DELIVERY_CAVEAT;
use crate::error::ErrorType;
use crate::export::Exporter;
use crate::settings::Settings;
use crate::{Config, Error, Result};

/// Validates and stores the endpoint settings.
pub async fn settings_save(config: Config, webhook: &str, sheet: &str) -> Result<Out<Settings>> {
    let settings = settings_store(&config).save(webhook, sheet).await?;
    let message = if settings.webhook().is_empty() {
        "Settings saved! No webhook is set, receipts cannot be exported until you add one"
    } else {
        "Settings saved!"
    };
    Ok(Out::new(message, settings))
}

/// Shows the stored endpoint settings.
pub async fn settings_show(config: Config) -> Result<Out<Settings>> {
    let settings = settings_store(&config).load().await?;
    let status = if settings.is_configured() {
        "Sync active"
    } else {
        "Sync inactive, save a script.google.com Web App URL as the webhook"
    };
    let message = format!(
        "{status}\nWebhook: {}\nSheet: {}",
        or_unset(settings.webhook()),
        or_unset(settings.sheet())
    );
    Ok(Out::new(message, settings))
}

/// Sends the sentinel row to the stored webhook. This does not need the extraction API key.
pub async fn test_connection(config: Config, mode: Mode) -> Result<Out<Delivery>> {
    let settings = settings_store(&config).load().await?;
    let exporter = Exporter::new(api::webhook(mode), config.export_settle());
    let delivery = exporter.test_connection(&settings).await?;
    let message = match &delivery {
        Delivery::Ack => "Test row appended to your sheet.".to_string(),
        Delivery::Unknown => format!("Test sent! {DELIVERY_CAVEAT}"),
        Delivery::Failed(reason) => {
            return Err(Error::msg(
                ErrorType::Export,
                format!("The webhook rejected the test: {reason}"),
            ))
        }
    };
    Ok(Out::new(message, delivery))
}

fn or_unset(s: &str) -> &str {
    if s.is_empty() {
        "(not set)"
    } else {
        s
    }
}
