//! GHG Report Generation Requests
//!
//! PDF rendering happens on the server. This module validates what the user
//! asked for, makes the call, and turns the server's answer into a
//! notification.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::DocumentStore;
use crate::error::{FormError, RemoteError, ValidationError, ValidationErrors};
use crate::notification::Notification;
use crate::validation::validate_period;

/// Server response to a render call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// A new report to create and render in one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub company: String,
    pub title: String,
    pub period_from: String,
    pub period_to: String,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedReport {
    pub company: String,
    pub title: String,
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
}

impl ReportRequest {
    /// All fields present and the period in order
    pub fn validate(&self) -> Result<ValidatedReport, ValidationErrors> {
        let missing: Vec<ValidationError> = [
            ("company", &self.company),
            ("title", &self.title),
            ("period_from", &self.period_from),
            ("period_to", &self.period_to),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(f, _)| ValidationError::Required(f.to_string()))
        .collect();
        ValidationErrors::into_result(missing)?;

        let (period_from, period_to) = validate_period(&self.period_from, &self.period_to)?;

        Ok(ValidatedReport {
            company: self.company.trim().to_string(),
            title: self.title.trim().to_string(),
            period_from,
            period_to,
        })
    }
}

/// Server-side report renderer
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Render the PDF for an existing report document
    async fn render(&self, document_id: &str) -> Result<RenderResult, RemoteError>;

    /// Create a report document and render it
    async fn create_and_render(
        &self,
        report: &ValidatedReport,
    ) -> Result<RenderResult, RemoteError>;
}

/// Render result plus the message to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub result: RenderResult,
    pub notification: Notification,
}

impl ReportOutcome {
    fn from_remote(result: Result<RenderResult, RemoteError>) -> Self {
        match result {
            Ok(result) if result.success => {
                info!(file_url = ?result.file_url, "Report generated");
                let message = if result.message.is_empty() {
                    "PDF generated".to_string()
                } else {
                    result.message.clone()
                };
                Self {
                    notification: Notification::success(message),
                    result,
                }
            }
            Ok(result) => {
                warn!(message = %result.message, "Report generation failed");
                let message = if result.message.is_empty() {
                    "Error generating PDF".to_string()
                } else {
                    result.message.clone()
                };
                Self {
                    notification: Notification::error(message),
                    result,
                }
            }
            Err(error) => {
                warn!(%error, "Report renderer unreachable");
                Self {
                    result: RenderResult {
                        success: false,
                        message: error.to_string(),
                        file_url: None,
                    },
                    notification: Notification::error("Error generating PDF. Please try again."),
                }
            }
        }
    }
}

/// Render the PDF for a saved document
pub async fn generate_for_document<D, R>(doc: &D, renderer: &R) -> Result<ReportOutcome, FormError>
where
    D: DocumentStore + ?Sized,
    R: ReportRenderer + ?Sized,
{
    let Some(id) = doc.document_id() else {
        return Err(ValidationErrors(vec![ValidationError::Unsaved]).into());
    };
    Ok(ReportOutcome::from_remote(renderer.render(id).await))
}

/// Validate a new report request, then create and render it
pub async fn create_and_generate<R>(
    request: &ReportRequest,
    renderer: &R,
) -> Result<ReportOutcome, FormError>
where
    R: ReportRenderer + ?Sized,
{
    let report = request.validate()?;
    Ok(ReportOutcome::from_remote(
        renderer.create_and_render(&report).await,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ReportRenderer for CountingRenderer {
        async fn render(&self, document_id: &str) -> Result<RenderResult, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RemoteError::Transport("timeout".to_string()));
            }
            Ok(RenderResult {
                success: true,
                message: format!("PDF generated for {}", document_id),
                file_url: Some(format!("/files/{}.pdf", document_id)),
            })
        }

        async fn create_and_render(
            &self,
            report: &ValidatedReport,
        ) -> Result<RenderResult, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderResult {
                success: false,
                message: format!("No emissions data for {}", report.company),
                file_url: None,
            })
        }
    }

    fn request(from: &str, to: &str) -> ReportRequest {
        ReportRequest {
            company: "Acme".to_string(),
            title: "FY24 inventory".to_string(),
            period_from: from.to_string(),
            period_to: to.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unsaved_document_rejected_before_call() {
        let renderer = CountingRenderer::default();
        let doc = MemoryDocument::new();

        let err = generate_for_document(&doc, &renderer).await.unwrap_err();
        assert!(matches!(err, FormError::Validation(_)));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_saved_document_rendered() {
        let renderer = CountingRenderer::default();
        let doc = MemoryDocument::named("GHG-0007");

        let outcome = generate_for_document(&doc, &renderer).await.unwrap();
        assert!(outcome.result.success);
        assert_eq!(outcome.result.file_url.as_deref(), Some("/files/GHG-0007.pdf"));
        assert!(!outcome.notification.is_error());
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_notification() {
        let renderer = CountingRenderer {
            fail: true,
            ..Default::default()
        };
        let doc = MemoryDocument::named("GHG-0007");

        let outcome = generate_for_document(&doc, &renderer).await.unwrap();
        assert!(!outcome.result.success);
        assert_eq!(
            outcome.notification,
            Notification::error("Error generating PDF. Please try again.")
        );
    }

    #[tokio::test]
    async fn test_inverted_period_never_reaches_server() {
        let renderer = CountingRenderer::default();

        let err = create_and_generate(&request("2024-12-31", "2024-01-01"), &renderer)
            .await
            .unwrap_err();
        match err {
            FormError::Validation(errors) => assert!(matches!(
                errors.issues()[0],
                ValidationError::PeriodInverted { .. }
            )),
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_server_failure_message_surfaced() {
        let renderer = CountingRenderer::default();

        let outcome = create_and_generate(&request("2024-01-01", "2024-12-31"), &renderer)
            .await
            .unwrap();
        assert!(outcome.notification.is_error());
        assert_eq!(outcome.notification.message, "No emissions data for Acme");
    }

    #[test]
    fn test_missing_fields_listed() {
        let mut req = request("2024-01-01", "2024-12-31");
        req.company = " ".to_string();
        req.title = String::new();

        let err = req.validate().unwrap_err();
        assert_eq!(
            err.issues(),
            &[
                ValidationError::Required("company".to_string()),
                ValidationError::Required("title".to_string()),
            ]
        );
    }
}
