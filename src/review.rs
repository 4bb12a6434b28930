//! Admin Review Actions
//!
//! Approve and reject are offered only on submitted applications and only
//! to users the host's permission check marks as elevated. The server does
//! the real work (company and user creation, emails); this side gates the
//! action, validates input, and reports the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::document::DocumentStore;
use crate::error::{FormError, RemoteError, ReviewError, ValidationError, ValidationErrors};
use crate::notification::Notification;

/// Field holding the application status
pub const STATUS_FIELD: &str = "status";

/// Lifecycle of an onboarding application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Read from a document; a missing or blank status is a draft
    pub fn of<D: DocumentStore + ?Sized>(doc: &D) -> Result<Self, ReviewError> {
        match doc.text(STATUS_FIELD) {
            None => Ok(Self::Draft),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Draft" => Ok(Self::Draft),
            "Submitted" => Ok(Self::Submitted),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            other => Err(ReviewError::NotReviewable(other.to_string())),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// Host permission check, consumed as an opaque answer
pub trait PermissionCheck: Send + Sync {
    fn is_elevated(&self, user: &str) -> bool;
}

/// Elevated when the user holds any of the configured admin roles
#[derive(Debug, Clone, Default)]
pub struct RolePermissions {
    elevated_roles: HashSet<String>,
    user_roles: HashMap<String, HashSet<String>>,
}

impl RolePermissions {
    pub fn new<I, S>(elevated_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elevated_roles: elevated_roles.into_iter().map(Into::into).collect(),
            user_roles: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>, roles: &[&str]) -> Self {
        self.user_roles
            .insert(user.into(), roles.iter().map(|r| r.to_string()).collect());
        self
    }
}

impl PermissionCheck for RolePermissions {
    fn is_elevated(&self, user: &str) -> bool {
        self.user_roles
            .get(user)
            .map(|roles| roles.iter().any(|r| self.elevated_roles.contains(r)))
            .unwrap_or(false)
    }
}

/// Server reply to an approve/reject call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReply {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Server side of the review actions
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn approve(&self, document_id: &str) -> Result<ReviewReply, RemoteError>;

    async fn reject(&self, document_id: &str, reason: &str) -> Result<ReviewReply, RemoteError>;
}

/// Actions to offer for a status and user
pub fn available_review_actions(status: ApplicationStatus, elevated: bool) -> Vec<ReviewAction> {
    if status == ApplicationStatus::Submitted && elevated {
        vec![ReviewAction::Approve, ReviewAction::Reject]
    } else {
        Vec::new()
    }
}

/// Result of a review call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub action: ReviewAction,
    pub success: bool,
    pub notification: Notification,
    /// The host should reload the document to show the new status
    pub reload: bool,
}

/// Who is acting and how to check them
pub struct Reviewer<'a> {
    pub user: &'a str,
    pub permissions: &'a dyn PermissionCheck,
}

/// Approve a submitted application
pub async fn approve<D, S>(
    doc: &D,
    reviewer: &Reviewer<'_>,
    service: &S,
) -> Result<ReviewOutcome, FormError>
where
    D: DocumentStore + ?Sized,
    S: ReviewService + ?Sized,
{
    let id = gate(doc, reviewer)?;
    let reply = service.approve(id).await;
    Ok(outcome(ReviewAction::Approve, id, reply))
}

/// Reject a submitted application; the reason is mandatory
pub async fn reject<D, S>(
    doc: &D,
    reviewer: &Reviewer<'_>,
    reason: &str,
    service: &S,
) -> Result<ReviewOutcome, FormError>
where
    D: DocumentStore + ?Sized,
    S: ReviewService + ?Sized,
{
    let id = gate(doc, reviewer)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ReviewError::MissingReason.into());
    }
    let reply = service.reject(id, reason).await;
    Ok(outcome(ReviewAction::Reject, id, reply))
}

fn gate<'d, D: DocumentStore + ?Sized>(
    doc: &'d D,
    reviewer: &Reviewer<'_>,
) -> Result<&'d str, FormError> {
    let Some(id) = doc.document_id() else {
        return Err(ValidationErrors(vec![ValidationError::Unsaved]).into());
    };
    if !reviewer.permissions.is_elevated(reviewer.user) {
        return Err(ReviewError::NotPermitted(reviewer.user.to_string()).into());
    }
    let status = ApplicationStatus::of(doc)?;
    if status != ApplicationStatus::Submitted {
        return Err(ReviewError::NotReviewable(status.to_string()).into());
    }
    Ok(id)
}

fn outcome(
    action: ReviewAction,
    id: &str,
    reply: Result<ReviewReply, RemoteError>,
) -> ReviewOutcome {
    let verb = match action {
        ReviewAction::Approve => "Approval",
        ReviewAction::Reject => "Rejection",
    };

    match reply {
        Ok(reply) if reply.success => {
            info!(document = id, ?action, "Review completed");
            let message = match action {
                ReviewAction::Approve => {
                    "Application approved. Company and users have been created."
                }
                ReviewAction::Reject => "Application rejected. Rejection email has been sent.",
            };
            ReviewOutcome {
                action,
                success: true,
                notification: Notification::success(message),
                reload: true,
            }
        }
        Ok(reply) => {
            warn!(document = id, ?action, message = %reply.message, "Review rejected by server");
            ReviewOutcome {
                action,
                success: false,
                notification: Notification::error(format!("{} failed: {}", verb, reply.message)),
                reload: false,
            }
        }
        Err(error) => {
            warn!(document = id, ?action, %error, "Review call failed");
            ReviewOutcome {
                action,
                success: false,
                notification: Notification::error(format!("{} failed: {}", verb, error)),
                reload: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReviewService for RecordingService {
        async fn approve(&self, document_id: &str) -> Result<ReviewReply, RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("approve:{}", document_id));
            Ok(ReviewReply {
                success: true,
                message: "Application approved successfully".to_string(),
            })
        }

        async fn reject(&self, document_id: &str, reason: &str) -> Result<ReviewReply, RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("reject:{}:{}", document_id, reason));
            Ok(ReviewReply {
                success: false,
                message: "Mail server down".to_string(),
            })
        }
    }

    fn permissions() -> RolePermissions {
        RolePermissions::new(["System Manager", "Administrator"])
            .with_user("admin@example.com", &["System Manager"])
            .with_user("applicant@example.com", &["Guest"])
    }

    fn submitted() -> MemoryDocument {
        MemoryDocument::named("OF-0042").with(STATUS_FIELD, "Submitted")
    }

    #[test]
    fn test_actions_only_for_submitted_and_elevated() {
        assert_eq!(
            available_review_actions(ApplicationStatus::Submitted, true),
            vec![ReviewAction::Approve, ReviewAction::Reject]
        );
        assert!(available_review_actions(ApplicationStatus::Submitted, false).is_empty());
        assert!(available_review_actions(ApplicationStatus::Approved, true).is_empty());
        assert!(available_review_actions(ApplicationStatus::Draft, true).is_empty());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            ApplicationStatus::of(&MemoryDocument::new()).unwrap(),
            ApplicationStatus::Draft
        );
        assert_eq!(
            ApplicationStatus::of(&submitted()).unwrap(),
            ApplicationStatus::Submitted
        );
        assert!("Pending".parse::<ApplicationStatus>().is_err());
        assert!(ApplicationStatus::Rejected.is_terminal());
    }

    #[tokio::test]
    async fn test_approve_by_admin() {
        let service = RecordingService::default();
        let perms = permissions();
        let reviewer = Reviewer {
            user: "admin@example.com",
            permissions: &perms,
        };

        let outcome = approve(&submitted(), &reviewer, &service).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.reload);
        assert_eq!(*service.calls.lock().unwrap(), vec!["approve:OF-0042"]);
    }

    #[tokio::test]
    async fn test_non_admin_blocked_before_call() {
        let service = RecordingService::default();
        let perms = permissions();
        let reviewer = Reviewer {
            user: "applicant@example.com",
            permissions: &perms,
        };

        let err = approve(&submitted(), &reviewer, &service).await.unwrap_err();
        assert!(matches!(err, FormError::Review(ReviewError::NotPermitted(_))));
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let service = RecordingService::default();
        let perms = permissions();
        let reviewer = Reviewer {
            user: "admin@example.com",
            permissions: &perms,
        };

        let err = reject(&submitted(), &reviewer, "   ", &service)
            .await
            .unwrap_err();
        assert!(matches!(err, FormError::Review(ReviewError::MissingReason)));
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_failure_reported() {
        let service = RecordingService::default();
        let perms = permissions();
        let reviewer = Reviewer {
            user: "admin@example.com",
            permissions: &perms,
        };

        let outcome = reject(&submitted(), &reviewer, "Incomplete unit data", &service)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(!outcome.reload);
        assert_eq!(
            outcome.notification.message,
            "Rejection failed: Mail server down"
        );
    }

    #[tokio::test]
    async fn test_already_approved_not_reviewable() {
        let service = RecordingService::default();
        let perms = permissions();
        let reviewer = Reviewer {
            user: "admin@example.com",
            permissions: &perms,
        };
        let doc = MemoryDocument::named("OF-0042").with(STATUS_FIELD, "Approved");

        let err = approve(&doc, &reviewer, &service).await.unwrap_err();
        assert!(matches!(err, FormError::Review(ReviewError::NotReviewable(_))));
    }
}
