use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound email kinds; each maps to one template pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailKind {
    Welcome,
    PasswordReset,
    PaymentReceipt,
    AppointmentReminder,
    RoutineAssigned,
    Reminder,
}

#[derive(Debug, Clone)]
struct EmailTemplate {
    subject: &'static str,
    text: &'static str,
    html: &'static str,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("No template registered for this email kind")]
    TemplateNotFound,
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Templated SMTP mailer
#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
    templates: HashMap<EmailKind, EmailTemplate>,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("host", &self.config.host)
            .field("from", &self.config.from_email)
            .finish()
    }
}

impl EmailService {
    pub fn new(config: SmtpConfig) -> Result<Self, EmailError> {
        let mut transport =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?.port(config.port);

        if !config.username.is_empty() {
            transport = transport.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: transport.build(),
            config,
            templates: load_templates(),
        })
    }

    /// Render and send one email. `context` pairs replace `{{key}}` markers.
    pub async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        kind: EmailKind,
        context: &[(&str, &str)],
    ) -> Result<(), EmailError> {
        let template = self
            .templates
            .get(&kind)
            .ok_or(EmailError::TemplateNotFound)?;

        let subject = render_template(template.subject, context);
        let text = render_template(template.text, context);
        let html = render_template(template.html, context);

        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.config.from_email.clone()))?;
        let to: Mailbox = format!("{to_name} <{to_email}>")
            .parse()
            .map_err(|_| EmailError::InvalidAddress(to_email.to_string()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        self.transport.send(message).await?;

        info!("sent {:?} email to {}", kind, to_email);

        Ok(())
    }
}

fn load_templates() -> HashMap<EmailKind, EmailTemplate> {
    let mut templates = HashMap::new();

    templates.insert(
        EmailKind::Welcome,
        EmailTemplate {
            subject: "Welcome to TrainerHub, {{user_name}}",
            text: include_str!("../templates/email/welcome.txt"),
            html: include_str!("../templates/email/welcome.html"),
        },
    );

    templates.insert(
        EmailKind::PasswordReset,
        EmailTemplate {
            subject: "Reset your TrainerHub password",
            text: include_str!("../templates/email/password_reset.txt"),
            html: include_str!("../templates/email/password_reset.html"),
        },
    );

    templates.insert(
        EmailKind::PaymentReceipt,
        EmailTemplate {
            subject: "Payment received - invoice {{invoice_number}}",
            text: include_str!("../templates/email/payment_receipt.txt"),
            html: include_str!("../templates/email/payment_receipt.html"),
        },
    );

    templates.insert(
        EmailKind::AppointmentReminder,
        EmailTemplate {
            subject: "Upcoming session: {{appointment_time}}",
            text: include_str!("../templates/email/appointment_reminder.txt"),
            html: include_str!("../templates/email/appointment_reminder.html"),
        },
    );

    templates.insert(
        EmailKind::RoutineAssigned,
        EmailTemplate {
            subject: "Your new routine is ready",
            text: include_str!("../templates/email/routine_assigned.txt"),
            html: include_str!("../templates/email/routine_assigned.html"),
        },
    );

    templates.insert(
        EmailKind::Reminder,
        EmailTemplate {
            subject: "Reminder from your trainer",
            text: include_str!("../templates/email/reminder.txt"),
            html: include_str!("../templates/email/reminder.html"),
        },
    );

    templates
}

/// Replace `{{key}}` markers with their context values
fn render_template(template: &str, context: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in context {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_substitutes_all_pairs() {
        let rendered = render_template(
            "Hi {{user_name}}, your plan {{plan}} is ready",
            &[("user_name", "Ana"), ("plan", "Strength 3x")],
        );

        assert_eq!(rendered, "Hi Ana, your plan Strength 3x is ready");
    }

    #[test]
    fn test_render_leaves_unknown_markers() {
        let rendered = render_template("Hello {{user_name}}", &[("other", "x")]);

        assert_eq!(rendered, "Hello {{user_name}}");
    }

    #[test]
    fn test_every_kind_has_a_template() {
        let templates = load_templates();

        for kind in [
            EmailKind::Welcome,
            EmailKind::PasswordReset,
            EmailKind::PaymentReceipt,
            EmailKind::AppointmentReminder,
            EmailKind::RoutineAssigned,
            EmailKind::Reminder,
        ] {
            let template = templates.get(&kind).expect("missing template");
            assert!(!template.subject.is_empty());
            assert!(!template.text.is_empty());
            assert!(!template.html.is_empty());
        }
    }
}
