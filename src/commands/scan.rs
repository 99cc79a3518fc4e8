use crate::api::{Delivery, Mode};
use crate::args::ScanArgs;
use crate::capture::FileCamera;
use crate::commands::{controller, Out};
use crate::controller::{Controller, State};
use crate::error::ErrorType;
use crate::export::category_correction;
use crate::model::{Category, ReceiptRecord};
use crate::{Config, Error, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// The outcome of `receipt scan`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    record: ReceiptRecord,
    /// `None` for a dry run.
    delivery: Option<Delivery>,
    /// Set when the extracted label was not a known category and `Other` is exported instead.
    exported_category: Option<Category>,
}

impl ScanReport {
    pub fn record(&self) -> &ReceiptRecord {
        &self.record
    }

    pub fn delivery(&self) -> Option<&Delivery> {
        self.delivery.as_ref()
    }

    pub fn exported_category(&self) -> Option<Category> {
        self.exported_category
    }
}

/// Captures `image` and extracts it. The record is not exported.
pub async fn analyze(config: Config, mode: Mode, image: &Path) -> Result<Out<ReceiptRecord>> {
    let mut controller = controller(&config, mode)?;
    capture_and_scan(&mut controller, image).await?;
    let record = current_record(&controller)?;
    controller.cancel_review()?;
    Ok(Out::new(
        format!(
            "Extracted '{}', total {} {}",
            record.merchant_name(),
            record.currency(),
            record.total_amount()
        ),
        record,
    ))
}

/// Runs the whole pipeline for `image`: capture, extract, apply the corrections in `args`, then
/// export (or cancel for a dry run).
pub async fn scan(config: Config, mode: Mode, args: ScanArgs) -> Result<Out<ScanReport>> {
    let mut controller = controller(&config, mode)?;
    capture_and_scan(&mut controller, args.image()).await?;
    apply_edits(&mut controller, &args)?;

    let record = current_record(&controller)?;
    let exported_category = category_correction(&record);
    if let Some(category) = exported_category {
        warn!(
            "The category '{}' is not known, it will be exported as {category}",
            record.category()
        );
    }

    if args.dry_run() {
        controller.cancel_review()?;
        return Ok(Out::new(
            format!("Dry run, '{}' was not exported", record.merchant_name()),
            ScanReport {
                record,
                delivery: None,
                exported_category,
            },
        ));
    }

    controller
        .confirm()
        .await
        .map_err(|e| with_banner(&controller, e))?;
    controller
        .export()
        .await
        .map_err(|e| with_banner(&controller, e))?;

    let message = controller
        .banner()
        .map(|banner| banner.message().to_string())
        .unwrap_or_default();
    let record = current_record(&controller)?;
    let delivery = match controller.state() {
        State::Success { delivery, .. } => Some(delivery.clone()),
        _ => None,
    };
    controller.scan_next()?;
    Ok(Out::new(
        message,
        ScanReport {
            record,
            delivery,
            exported_category,
        },
    ))
}

/// Drives the controller from `Idle` to `Reviewing`.
async fn capture_and_scan(controller: &mut Controller, image: &Path) -> Result<()> {
    let camera = FileCamera::new(image);
    if let Err(e) = controller.start_capture(Box::new(camera)).await {
        controller.cancel_capture()?;
        return Err(e);
    }
    if let Err(e) = controller.capture().await {
        controller.cancel_capture()?;
        return Err(e);
    }
    controller
        .scan()
        .await
        .map_err(|e| with_banner(controller, e))?;
    debug!("Controller is {}", controller.phase());
    Ok(())
}

fn apply_edits(controller: &mut Controller, args: &ScanArgs) -> Result<()> {
    let review = controller.review_mut()?;
    if let Some(merchant) = args.merchant() {
        review.set_merchant(merchant);
    }
    if let Some(category) = args.category() {
        review.set_category(category);
    }
    for edit in args.item_names() {
        review.set_item_name(edit.index(), edit.value())?;
    }
    for edit in args.item_prices() {
        review.set_item_price_str(edit.index(), edit.value())?;
    }
    if review.is_edited() {
        debug!("Applied corrections: {:?}", review.record());
    }
    Ok(())
}

fn current_record(controller: &Controller) -> Result<ReceiptRecord> {
    controller.record().cloned().ok_or_else(|| {
        Error::msg(
            ErrorType::State,
            format!("There is no receipt while the app is {}", controller.phase()),
        )
    })
}

/// Puts the message the user would have seen in front of the underlying error.
fn with_banner(controller: &Controller, e: Error) -> Error {
    match controller.banner() {
        Some(banner) if banner.is_error() && banner.message() != e.message() => Error::new(
            e.kind(),
            anyhow::Error::new(e).context(banner.message().to_string()),
        ),
        _ => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestExtractor, TestWebhook};
    use crate::commands::settings_save;
    use crate::controller::{Phase, SCAN_FAILED};
    use crate::export::Exporter;
    use crate::settings::{MemoryStore, SettingsStore};
    use crate::test::{TestEnv, SHEET, WEBHOOK};
    use std::time::Duration;

    #[tokio::test]
    async fn test_analyze_in_test_mode() {
        let env = TestEnv::new().await;
        let out = analyze(env.config(), Mode::Test, &env.image())
            .await
            .unwrap();
        let record = out.structure().unwrap();
        assert_eq!(record.merchant_name(), "Cafe X");
        assert_eq!(record.items().len(), 3);
        assert!(out.message().contains("12.5"));
    }

    #[tokio::test]
    async fn test_analyze_missing_image() {
        let env = TestEnv::new().await;
        let missing = env.config().root().join("missing.jpg");
        let err = analyze(env.config(), Mode::Test, &missing)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Capture);
    }

    #[tokio::test]
    async fn test_analyze_not_a_jpeg() {
        let env = TestEnv::new().await;
        let path = env.config().root().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let err = analyze(env.config(), Mode::Test, &path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::Capture);
    }

    #[tokio::test]
    async fn test_scan_with_edits() {
        let env = TestEnv::new().await;
        settings_save(env.config(), WEBHOOK, SHEET).await.unwrap();
        let args = ScanArgs::new(env.image())
            .with_merchant("Cafe Y")
            .with_category(Category::Groceries)
            .with_item_name(0, "Latte")
            .with_item_price(1, "3.25");
        let out = scan(env.config(), Mode::Test, args).await.unwrap();
        let report = out.structure().unwrap();
        assert_eq!(report.record().merchant_name(), "Cafe Y");
        assert_eq!(report.record().category(), "Groceries");
        assert_eq!(report.record().items()[0].name(), "Latte");
        assert_eq!(report.record().items()[1].price().to_string(), "3.25");
        assert_eq!(report.delivery(), Some(&Delivery::Ack));
        assert_eq!(report.exported_category(), None);
        assert_eq!(out.message(), "Your expense has been logged.");
    }

    #[tokio::test]
    async fn test_scan_dry_run_does_not_need_a_webhook() {
        let env = TestEnv::new().await;
        let args = ScanArgs::new(env.image()).with_dry_run(true);
        let out = scan(env.config(), Mode::Test, args).await.unwrap();
        assert!(out.structure().unwrap().delivery().is_none());
        assert!(out.message().contains("Dry run"));
    }

    #[tokio::test]
    async fn test_scan_without_webhook_fails_with_configuration_error() {
        let env = TestEnv::new().await;
        let err = scan(env.config(), Mode::Test, ScanArgs::new(env.image()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Configuration);
    }

    #[tokio::test]
    async fn test_scan_bad_item_index() {
        let env = TestEnv::new().await;
        settings_save(env.config(), WEBHOOK, SHEET).await.unwrap();
        let args = ScanArgs::new(env.image()).with_item_price(9, "1");
        let err = scan(env.config(), Mode::Test, args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::State);
    }

    #[tokio::test]
    async fn test_failed_extraction_leads_with_the_user_message() {
        let env = TestEnv::new().await;
        let mut controller = Controller::new(
            SettingsStore::new(MemoryStore::new()),
            Box::new(TestExtractor::new("{\"merchantName\": ")),
            Exporter::new(Box::new(TestWebhook::default()), Duration::ZERO),
        );
        let err = capture_and_scan(&mut controller, &env.image())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Extraction);
        assert_eq!(err.message(), SCAN_FAILED);
        assert_eq!(controller.phase(), Phase::Idle);
    }
}
