//! The application controller: the capture → scan → review → export state machine.
//!
//! Every user action is a named transition function. A transition either returns the `Phase` the
//! controller is now in, or an error; on error the controller has already moved to the fallback
//! state for that failure (see the transition docs). A transition requested from a state that does
//! not offer it fails with `ErrorType::State` and changes nothing.
//!
//! Remote calls are split into a `begin_*` half that hands out a ticket and a `complete_*` half
//! that takes the result back. Leaving a state (`abandon`) invalidates outstanding tickets, so a
//! late result is ignored instead of being applied to a state the user already left. `scan` and
//! `export` run both halves.

use crate::api::{Delivery, Extractor};
use crate::capture::{Camera, CaptureSession, CapturedImage};
use crate::error::{ErrorType, IntoResult};
use crate::export::Exporter;
use crate::model::ReceiptRecord;
use crate::review::Review;
use crate::settings::{Settings, SettingsStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shown whenever extraction fails, whatever the reason.
pub const SCAN_FAILED: &str = "Failed to analyze receipt. Please try again with a clearer picture.";

/// Reminds the user that delivery cannot always be confirmed.
pub const DELIVERY_CAVEAT: &str =
    "If the row didn't appear, ensure you deployed the script as a Web App for 'Anyone'.";

/// The name of the current state, without its data.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Capturing,
    Scanning,
    Reviewing,
    Exporting,
    Success,
}

serde_plain::derive_display_from_serialize!(Phase);

/// The state of the controller and the data that only exists in that state.
#[derive(Debug)]
pub enum State {
    Idle,
    /// `session` is `None` when the camera could not be opened; only cancel is possible then.
    Capturing {
        session: Option<CaptureSession>,
    },
    Scanning {
        scan_id: Uuid,
        image: CapturedImage,
    },
    Reviewing {
        scan_id: Uuid,
        review: Review,
    },
    Exporting {
        scan_id: Uuid,
        review: Review,
        settings: Settings,
    },
    Success {
        scan_id: Uuid,
        record: ReceiptRecord,
        delivery: Delivery,
    },
}

impl State {
    pub fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Capturing { .. } => Phase::Capturing,
            State::Scanning { .. } => Phase::Scanning,
            State::Reviewing { .. } => Phase::Reviewing,
            State::Exporting { .. } => Phase::Exporting,
            State::Success { .. } => Phase::Success,
        }
    }
}

/// A transient, dismissible message.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "banner")]
pub enum Banner {
    Error { kind: ErrorType, message: String },
    Success { message: String },
}

impl Banner {
    fn error(kind: ErrorType, message: impl Into<String>) -> Self {
        Banner::Error {
            kind,
            message: message.into(),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Banner::Success {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Banner::Error { message, .. } | Banner::Success { message } => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Banner::Error { .. })
    }
}

/// The outstanding extraction request.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    epoch: u64,
    scan_id: Uuid,
    image: CapturedImage,
}

impl ScanTicket {
    pub fn image(&self) -> &CapturedImage {
        &self.image
    }
}

/// The outstanding export request.
#[derive(Debug, Clone)]
pub struct ExportTicket {
    epoch: u64,
    scan_id: Uuid,
    record: ReceiptRecord,
    settings: Settings,
}

impl ExportTicket {
    pub fn record(&self) -> &ReceiptRecord {
        &self.record
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Owns the state machine and the components it drives.
pub struct Controller {
    state: State,
    banner: Option<Banner>,
    epoch: u64,
    settings: SettingsStore,
    extractor: Box<dyn Extractor>,
    exporter: Exporter,
}

impl Controller {
    pub fn new(settings: SettingsStore, extractor: Box<dyn Extractor>, exporter: Exporter) -> Self {
        Self {
            state: State::Idle,
            banner: None,
            epoch: 0,
            settings,
            extractor,
            exporter,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// The record under review, being exported, or exported.
    pub fn record(&self) -> Option<&ReceiptRecord> {
        match &self.state {
            State::Reviewing { review, .. } | State::Exporting { review, .. } => {
                Some(review.record())
            }
            State::Success { record, .. } => Some(record),
            _ => None,
        }
    }

    /// The current settings, read from the store.
    pub async fn settings(&self) -> Result<Settings> {
        self.settings.load().await
    }

    /// `Idle`: validates and persists the endpoint settings.
    pub async fn save_settings(&mut self, webhook: &str, sheet: &str) -> Result<Settings> {
        self.ensure_phase(Phase::Idle, "save settings")?;
        match self.settings.save(webhook, sheet).await {
            Ok(settings) => {
                self.banner = Some(Banner::success("Settings saved!"));
                Ok(settings)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// `Idle`: sends a sentinel row to the configured webhook.
    pub async fn test_connection(&mut self) -> Result<Delivery> {
        self.ensure_phase(Phase::Idle, "test the connection")?;
        let settings = self.settings.load().await?;
        match self.exporter.test_connection(&settings).await {
            Ok(Delivery::Failed(reason)) => {
                self.banner = Some(Banner::error(
                    ErrorType::Export,
                    format!("The webhook rejected the test: {reason}"),
                ));
                Ok(Delivery::Failed(reason))
            }
            Ok(delivery) => {
                self.banner = Some(Banner::success(match delivery {
                    Delivery::Ack => "Test row appended to your sheet.".to_string(),
                    _ => "Test sent! If your sheet is empty, check your Deployment settings."
                        .to_string(),
                }));
                Ok(delivery)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// `Idle` → `Capturing`: opens the camera.
    ///
    /// If the camera cannot be opened the controller is still `Capturing`, with no session, and
    /// a capture error is returned. Only `cancel_capture` is possible from there.
    pub async fn start_capture(&mut self, camera: Box<dyn Camera>) -> Result<Phase> {
        self.ensure_phase(Phase::Idle, "start a capture")?;
        self.banner = None;
        match CaptureSession::open(camera).await {
            Ok(session) => {
                self.state = State::Capturing {
                    session: Some(session),
                };
                Ok(self.phase())
            }
            Err(e) => {
                self.state = State::Capturing { session: None };
                Err(self.fail(e))
            }
        }
    }

    /// `Capturing` → `Scanning`: takes one picture and releases the camera.
    ///
    /// A failed capture stays in `Capturing` so the user can try again or cancel.
    pub async fn capture(&mut self) -> Result<Phase> {
        let session = match &mut self.state {
            State::Capturing {
                session: Some(session),
            } => session,
            State::Capturing { session: None } => {
                return Err(Error::msg(
                    ErrorType::Capture,
                    "The camera is not available, cancel to go back",
                ))
            }
            other => return Err(wrong_state(other.phase(), "capture")),
        };
        let image = match session.capture().await {
            Ok(image) => image,
            Err(e) => return Err(self.fail(e)),
        };
        // Replacing the state drops the session, which releases the camera.
        let scan_id = Uuid::new_v4();
        self.state = State::Scanning { scan_id, image };
        info!(%scan_id, "Captured receipt image");
        Ok(self.phase())
    }

    /// `Capturing` → `Idle`: releases the camera.
    pub fn cancel_capture(&mut self) -> Result<Phase> {
        self.ensure_phase(Phase::Capturing, "cancel a capture")?;
        self.state = State::Idle;
        self.banner = None;
        Ok(self.phase())
    }

    /// `Scanning`: hands out the request for the extraction client.
    pub fn begin_scan(&mut self) -> Result<ScanTicket> {
        match &self.state {
            State::Scanning { scan_id, image } => Ok(ScanTicket {
                epoch: self.epoch,
                scan_id: *scan_id,
                image: image.clone(),
            }),
            other => Err(wrong_state(other.phase(), "scan")),
        }
    }

    /// `Scanning` → `Reviewing` on success, `Idle` on any failure (the image is discarded).
    ///
    /// A result for a ticket that is no longer current is ignored and the current phase returned.
    pub fn complete_scan(
        &mut self,
        ticket: ScanTicket,
        result: Result<ReceiptRecord>,
    ) -> Result<Phase> {
        if !self.is_current(ticket.epoch, Phase::Scanning) {
            debug!(scan_id = %ticket.scan_id, "Ignoring a stale extraction result");
            return Ok(self.phase());
        }
        self.epoch += 1;
        match result {
            Ok(record) => {
                info!(
                    scan_id = %ticket.scan_id,
                    "Extracted '{}' with {} items",
                    record.merchant_name(),
                    record.items().len()
                );
                self.state = State::Reviewing {
                    scan_id: ticket.scan_id,
                    review: Review::new(record),
                };
                Ok(self.phase())
            }
            Err(e) => {
                warn!(scan_id = %ticket.scan_id, "Extraction failed: {e}");
                self.state = State::Idle;
                self.banner = Some(Banner::error(ErrorType::Extraction, SCAN_FAILED));
                Err(e)
            }
        }
    }

    /// `Scanning`: runs the extraction and completes it, see `complete_scan`.
    pub async fn scan(&mut self) -> Result<Phase> {
        let ticket = self.begin_scan()?;
        let result = self
            .extractor
            .analyze(ticket.image())
            .await
            .pub_result(ErrorType::Extraction);
        self.complete_scan(ticket, result)
    }

    /// Leaves `Scanning` for `Idle` or `Exporting` for `Reviewing` without waiting for the
    /// outstanding request. The request itself is not aborted; its result will be ignored.
    pub fn abandon(&mut self) -> Result<Phase> {
        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::Scanning { scan_id, .. } => {
                debug!(%scan_id, "Abandoned extraction");
                State::Idle
            }
            State::Exporting {
                scan_id, review, ..
            } => {
                debug!(%scan_id, "Abandoned export");
                State::Reviewing { scan_id, review }
            }
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(wrong_state(phase, "abandon a request"));
            }
        };
        self.epoch += 1;
        Ok(self.phase())
    }

    /// `Reviewing`: the editable record.
    pub fn review_mut(&mut self) -> Result<&mut Review> {
        match &mut self.state {
            State::Reviewing { review, .. } => Ok(review),
            other => Err(wrong_state(other.phase(), "edit the receipt")),
        }
    }

    /// `Reviewing` → `Idle`: discards the record and its edits.
    pub fn cancel_review(&mut self) -> Result<Phase> {
        self.ensure_phase(Phase::Reviewing, "cancel the review")?;
        self.state = State::Idle;
        self.banner = None;
        Ok(self.phase())
    }

    /// `Reviewing` → `Exporting`.
    ///
    /// The settings are read now. If the webhook is not usable the controller stays in
    /// `Reviewing`, with the edits, and a configuration error is returned.
    pub async fn confirm(&mut self) -> Result<Phase> {
        self.ensure_phase(Phase::Reviewing, "confirm the receipt")?;
        let settings = match self.settings.load().await {
            Ok(settings) => settings,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = settings.webhook_for_use() {
            return Err(self.fail(e));
        }
        self.state = match std::mem::replace(&mut self.state, State::Idle) {
            State::Reviewing { scan_id, review } => State::Exporting {
                scan_id,
                review,
                settings,
            },
            other => other,
        };
        self.banner = None;
        Ok(self.phase())
    }

    /// `Exporting`: hands out the request for the export client.
    pub fn begin_export(&mut self) -> Result<ExportTicket> {
        match &self.state {
            State::Exporting {
                scan_id,
                review,
                settings,
            } => Ok(ExportTicket {
                epoch: self.epoch,
                scan_id: *scan_id,
                record: review.record().clone(),
                settings: settings.clone(),
            }),
            other => Err(wrong_state(other.phase(), "export")),
        }
    }

    /// `Exporting` → `Success` when the request completed and the receiver did not reject it,
    /// otherwise back to `Reviewing` with the edits kept.
    ///
    /// A result for a ticket that is no longer current is ignored and the current phase returned.
    pub fn complete_export(
        &mut self,
        ticket: ExportTicket,
        result: Result<Delivery>,
    ) -> Result<Phase> {
        if !self.is_current(ticket.epoch, Phase::Exporting) {
            debug!(scan_id = %ticket.scan_id, "Ignoring a stale export result");
            return Ok(self.phase());
        }
        self.epoch += 1;
        let result = match result {
            Ok(Delivery::Failed(reason)) => Err(Error::msg(
                ErrorType::Export,
                format!("The webhook rejected the receipt: {reason}"),
            )),
            other => other,
        };
        let (scan_id, review) = match std::mem::replace(&mut self.state, State::Idle) {
            State::Exporting {
                scan_id, review, ..
            } => (scan_id, review),
            other => {
                self.state = other;
                return Ok(self.phase());
            }
        };
        match result {
            Ok(delivery) => {
                info!(%scan_id, "Export finished: {delivery}");
                self.banner = Some(Banner::success(match delivery {
                    Delivery::Ack => "Your expense has been logged.".to_string(),
                    _ => format!("Your expense has been sent. {DELIVERY_CAVEAT}"),
                }));
                self.state = State::Success {
                    scan_id,
                    record: review.finish(),
                    delivery,
                };
                Ok(self.phase())
            }
            Err(e) => {
                warn!(%scan_id, "Export failed: {e}");
                self.state = State::Reviewing { scan_id, review };
                Err(self.fail(e))
            }
        }
    }

    /// `Exporting`: runs the export and completes it, see `complete_export`.
    pub async fn export(&mut self) -> Result<Phase> {
        let ticket = self.begin_export()?;
        let result = self
            .exporter
            .export(ticket.settings(), ticket.record())
            .await;
        self.complete_export(ticket, result)
    }

    /// `Success` → `Idle`: forgets the record.
    pub fn scan_next(&mut self) -> Result<Phase> {
        self.ensure_phase(Phase::Success, "scan the next receipt")?;
        self.state = State::Idle;
        self.banner = None;
        Ok(self.phase())
    }

    fn ensure_phase(&self, phase: Phase, action: &str) -> Result<()> {
        if self.phase() == phase {
            Ok(())
        } else {
            Err(wrong_state(self.phase(), action))
        }
    }

    fn is_current(&self, epoch: u64, phase: Phase) -> bool {
        self.epoch == epoch && self.phase() == phase
    }

    /// Shows `e` in the error banner and hands it back.
    fn fail(&mut self, e: Error) -> Error {
        self.banner = Some(Banner::error(e.kind(), e.message()));
        e
    }
}

impl Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("banner", &self.banner)
            .field("epoch", &self.epoch)
            .finish()
    }
}

fn wrong_state(phase: Phase, action: &str) -> Error {
    Error::msg(
        ErrorType::State,
        format!("Cannot {action} while the app is {phase}"),
    )
}
