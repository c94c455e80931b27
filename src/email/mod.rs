//! Analysis result notifications by email.

pub mod sendgrid;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::analysis::AnalysisIssue;

pub use sendgrid::SendGridSender;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email API key is not configured")]
    NotConfigured,
    #[error("email request failed: {0}")]
    Transport(String),
    #[error("email provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub from_email: String,
    pub from_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[derive(Debug, Clone)]
pub struct AnalysisEmail {
    pub file_name: String,
    pub file_id: String,
    pub user_email: String,
    pub compliance_score: u32,
    pub total_issues: usize,
    pub high_severity_issues: usize,
    pub medium_severity_issues: usize,
    pub low_severity_issues: usize,
    pub issues: Vec<AnalysisIssue>,
    pub guideline_folder_name: String,
    pub download_url: String,
    pub analysis_date: String,
}

pub struct Notifier {
    sender: Arc<dyn EmailSender>,
    from_email: String,
    from_name: String,
}

impl Notifier {
    pub fn new(sender: Arc<dyn EmailSender>, from_email: String, from_name: String) -> Self {
        Self {
            sender,
            from_email,
            from_name,
        }
    }

    fn message(&self, to: &str, subject: String, text: String, html: String) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            from_email: self.from_email.clone(),
            from_name: self.from_name.clone(),
            subject,
            text,
            html,
        }
    }

    /// Delivery failures are logged and reported as `false`.
    pub async fn send_analysis_results(&self, data: &AnalysisEmail) -> bool {
        let message = self.message(
            &data.user_email,
            templates::subject(data),
            templates::render_text(data),
            templates::render_html(data),
        );
        match self.sender.send(&message).await {
            Ok(()) => {
                info!(file_id = %data.file_id, to = %data.user_email, "analysis results email sent");
                true
            }
            Err(err) => {
                error!(file_id = %data.file_id, error = %err, "failed to send analysis results email");
                false
            }
        }
    }

    pub async fn send_test_email(&self, to: &str) -> bool {
        let message = self.message(
            to,
            templates::TEST_SUBJECT.to_string(),
            templates::TEST_TEXT.to_string(),
            templates::TEST_HTML.to_string(),
        );
        match self.sender.send(&message).await {
            Ok(()) => {
                info!(to, "test email sent");
                true
            }
            Err(err) => {
                error!(to, error = %err, "failed to send test email");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            if self.fail {
                return Err(EmailError::Transport("down".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_email_uses_configured_sender() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = Notifier::new(sender.clone(), "noreply@brand.test".into(), "Brand Guard".into());

        assert!(notifier.send_test_email("admin@brand.test").await);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Brand Guard - Email Service Test");
        assert_eq!(sent[0].from_name, "Brand Guard");
        assert_eq!(sent[0].to, "admin@brand.test");
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::new(sender, "a@b.c".into(), "B".into());
        assert!(!notifier.send_test_email("x@y.z").await);
    }
}
