//! Transactional email.
//!
//! Uses SMTP via lettre with Askama text and HTML templates. When no SMTP
//! host is configured the rendered text body is logged instead of sent.

use askama::Template;
use chrono::{DateTime, NaiveDate, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::product::Product;

/// One-time code email (OTP or password reset).
#[derive(Template)]
#[template(path = "email/code.html")]
struct CodeEmailHtml<'a> {
    heading: &'a str,
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/code.txt")]
struct CodeEmailText<'a> {
    heading: &'a str,
    code: &'a str,
    minutes: i64,
}

/// General notice with an optional call to action.
#[derive(Template)]
#[template(path = "email/notice.html")]
struct NoticeEmailHtml<'a> {
    heading: &'a str,
    lines: &'a [String],
    link: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/notice.txt")]
struct NoticeEmailText<'a> {
    heading: &'a str,
    lines: &'a [String],
    link: Option<&'a str>,
}

/// Invitation to pay a share of a collaborative purchase.
#[derive(Template)]
#[template(path = "email/collaborative_invite.html")]
struct InviteEmailHtml<'a> {
    creator_name: &'a str,
    products: &'a str,
    share: Decimal,
    deadline: String,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/collaborative_invite.txt")]
struct InviteEmailText<'a> {
    creator_name: &'a str,
    products: &'a str,
    share: Decimal,
    deadline: String,
    link: &'a str,
}

/// Reminder confirmation or delivery, with gift ideas.
#[derive(Template)]
#[template(path = "email/reminder.html")]
struct ReminderEmailHtml<'a> {
    heading: &'a str,
    name: &'a str,
    event: &'a str,
    message: &'a str,
    date: String,
    time: &'a str,
    occasion: &'a str,
    products: &'a [Product],
}

#[derive(Template)]
#[template(path = "email/reminder.txt")]
struct ReminderEmailText<'a> {
    heading: &'a str,
    name: &'a str,
    event: &'a str,
    message: &'a str,
    date: String,
    time: &'a str,
    occasion: &'a str,
    products: &'a [Product],
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Reminder details shared by the confirmation and the scheduled email.
#[derive(Debug, Clone, Copy)]
pub struct ReminderMail<'a> {
    pub name: &'a str,
    pub event: &'a str,
    pub message: &'a str,
    pub date: NaiveDate,
    pub time: &'a str,
    pub occasion: &'a str,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
}

impl EmailService {
    /// Create an email service. `None` gives a service that only logs.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            return Ok(Self::log_only());
        };
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Some(mailer),
            from_address: config.from_address.clone(),
        })
    }

    /// A service that logs messages instead of sending them.
    #[must_use]
    pub fn log_only() -> Self {
        Self {
            mailer: None,
            from_address: "Best Wishes <no-reply@localhost>".to_string(),
        }
    }

    /// Send a login OTP.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_otp(&self, to: &str, code: &str, minutes: i64) -> Result<(), EmailError> {
        self.send_code(to, "Your verification code", code, minutes, "Your Best Wishes verification code")
            .await
    }

    /// Send a password reset code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_reset_code(&self, to: &str, code: &str, minutes: i64) -> Result<(), EmailError> {
        self.send_code(to, "Reset your password", code, minutes, "Best Wishes password reset code")
            .await
    }

    async fn send_code(
        &self,
        to: &str,
        heading: &str,
        code: &str,
        minutes: i64,
        subject: &str,
    ) -> Result<(), EmailError> {
        let html = CodeEmailHtml { heading, code, minutes }.render()?;
        let text = CodeEmailText { heading, code, minutes }.render()?;
        self.send_multipart_email(to, subject, &text, &html).await
    }

    /// Send a plain notice: a heading, a few lines, and an optional link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_notice(
        &self,
        to: &str,
        subject: &str,
        heading: &str,
        lines: &[String],
        link: Option<&str>,
    ) -> Result<(), EmailError> {
        let html = NoticeEmailHtml { heading, lines, link }.render()?;
        let text = NoticeEmailText { heading, lines, link }.render()?;
        self.send_multipart_email(to, subject, &text, &html).await
    }

    /// Invite a participant to pay their share.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_collaborative_invite(
        &self,
        to: &str,
        creator_name: &str,
        products: &str,
        share: Decimal,
        deadline: DateTime<Utc>,
        link: &str,
    ) -> Result<(), EmailError> {
        let deadline = deadline.format("%B %-d, %Y %H:%M UTC").to_string();
        let html = InviteEmailHtml {
            creator_name,
            products,
            share,
            deadline: deadline.clone(),
            link,
        }
        .render()?;
        let text = InviteEmailText {
            creator_name,
            products,
            share,
            deadline,
            link,
        }
        .render()?;
        self.send_multipart_email(
            to,
            &format!("{creator_name} invited you to a group gift"),
            &text,
            &html,
        )
        .await
    }

    /// Confirm a newly set reminder, or deliver a due one.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_reminder(
        &self,
        to: &str,
        reminder: ReminderMail<'_>,
        products: &[Product],
        confirmation: bool,
    ) -> Result<(), EmailError> {
        let (heading, subject) = if confirmation {
            ("Your reminder is set", format!("Reminder set: {}", reminder.event))
        } else {
            ("Don't forget!", format!("Reminder: {}", reminder.event))
        };
        let date = reminder.date.format("%B %-d, %Y").to_string();
        let html = ReminderEmailHtml {
            heading,
            name: reminder.name,
            event: reminder.event,
            message: reminder.message,
            date: date.clone(),
            time: reminder.time,
            occasion: reminder.occasion,
            products,
        }
        .render()?;
        let text = ReminderEmailText {
            heading,
            name: reminder.name,
            event: reminder.event,
            message: reminder.message,
            date,
            time: reminder.time,
            occasion: reminder.occasion,
            products,
        }
        .render()?;
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, subject = %subject, body = %text_body, "SMTP disabled, email logged");
            return Ok(());
        };
        mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_template_renders_code_and_expiry() {
        let text = CodeEmailText {
            heading: "Your verification code",
            code: "004213",
            minutes: 10,
        }
        .render()
        .unwrap_or_default();
        assert!(text.contains("004213"));
        assert!(text.contains("10 minutes"));
    }

    #[test]
    fn test_notice_template_escapes_html() {
        let lines = vec!["<b>Order</b> #000042".to_string()];
        let html = NoticeEmailHtml {
            heading: "Update",
            lines: &lines,
            link: None,
        }
        .render()
        .unwrap_or_default();
        assert!(html.contains("&lt;b&gt;Order&lt;/b&gt;"));
    }

    #[test]
    fn test_reminder_template_lists_products() {
        let products = vec![crate::models::product::fixtures::product(1, "Rose Mug", "20", Some("15"))];
        let text = ReminderEmailText {
            heading: "Don't forget!",
            name: "Ada",
            event: "Mum's birthday",
            message: "Buy flowers",
            date: "March 14, 2025".to_string(),
            time: "09:30",
            occasion: "Birthday",
            products: &products,
        }
        .render()
        .unwrap_or_default();
        assert!(text.contains("Rose Mug"));
        assert!(text.contains("15"));
    }

    #[tokio::test]
    async fn test_log_only_service_accepts_mail() {
        let service = EmailService::log_only();
        let result = service
            .send_notice("ada@example.com", "Hi", "Hello", &["Line".to_string()], None)
            .await;
        assert!(result.is_ok());
    }
}
