use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::WhatsAppConfig;
use crate::models::MessageDirection;
use crate::services::{AppointmentService, RoutineService};

/// Inbound webhook payload, Graph API shape
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookChange {
    pub value: WebhookChangeValue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<InboundText>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundText {
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Error)]
pub enum WhatsAppError {
    #[error("Graph API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Graph API rejected the message: {0}")]
    Api(String),
}

/// Commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    TodaysRoutine,
    NextAppointment,
    Help,
}

/// Map free text to a bot command. Spanish and English keywords are both
/// recognized; anything else gets the help menu.
pub fn command_for(text: &str) -> BotCommand {
    let normalized = text.trim().to_lowercase();

    if normalized.contains("rutina") || normalized.contains("routine") {
        BotCommand::TodaysRoutine
    } else if normalized.contains("cita")
        || normalized.contains("next")
        || normalized.contains("appointment")
    {
        BotCommand::NextAppointment
    } else {
        BotCommand::Help
    }
}

const HELP_TEXT: &str = "Hi! I can help with:\n\
                         - \"routine\" / \"rutina\": today's training day\n\
                         - \"next\" / \"cita\": your next session";

const ONBOARDING_TEXT: &str = "Hi! This number is not linked to a TrainerHub account yet. \
                               Ask your trainer for an invitation to get started.";

/// WhatsApp Cloud API wrapper and inbound bot
#[derive(Debug, Clone)]
pub struct WhatsAppService {
    client: reqwest::Client,
    config: WhatsAppConfig,
    db: PgPool,
    routines: RoutineService,
    appointments: AppointmentService,
}

impl WhatsAppService {
    pub fn new(
        config: WhatsAppConfig,
        db: PgPool,
        routines: RoutineService,
        appointments: AppointmentService,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            db,
            routines,
            appointments,
        }
    }

    pub fn verify_token(&self) -> &str {
        &self.config.verify_token
    }

    /// Send a text message, returning the Graph API message id
    pub async fn send_text(&self, to_phone: &str, body: &str) -> Result<String, WhatsAppError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to_phone,
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .client
            .post(self.config.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api(format!("{status}: {detail}")));
        }

        let sent: SendResponse = response.json().await?;
        let message_id = sent
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| WhatsAppError::Api("response carried no message id".to_string()))?;

        Ok(message_id)
    }

    /// Process an inbound webhook payload.
    ///
    /// Each text message gets a reply; failures are logged and never bubble
    /// up, so the provider always receives a 200 and does not re-deliver.
    pub async fn handle_inbound(&self, payload: WebhookPayload) {
        for message in extract_text_messages(&payload) {
            if let Err(e) = self.handle_message(&message).await {
                error!("failed to handle inbound whatsapp message: {e:#}");
            }
        }
    }

    async fn handle_message(&self, message: &InboundMessage) -> anyhow::Result<()> {
        let text = match &message.text {
            Some(text) => text.body.clone(),
            None => return Ok(()),
        };

        let user_id = self.user_for_phone(&message.from).await?;
        self.log_message(
            user_id,
            &message.from,
            MessageDirection::Inbound,
            &text,
            Some(&message.id),
        )
        .await?;

        let reply = match user_id {
            None => ONBOARDING_TEXT.to_string(),
            Some(user_id) => self.answer(user_id, &text).await?,
        };

        match self.send_text(&message.from, &reply).await {
            Ok(wa_message_id) => {
                self.log_message(
                    user_id,
                    &message.from,
                    MessageDirection::Outbound,
                    &reply,
                    Some(&wa_message_id),
                )
                .await?;
            }
            Err(e) => warn!("failed to send whatsapp reply to {}: {e}", message.from),
        }

        Ok(())
    }

    async fn answer(&self, user_id: Uuid, text: &str) -> anyhow::Result<String> {
        let reply = match command_for(text) {
            BotCommand::TodaysRoutine => match self.routines.todays_day_summary(user_id).await {
                Ok(Some(summary)) => summary,
                Ok(None) => "You have no active routine yet. Ask your trainer!".to_string(),
                Err(e) => {
                    error!("routine lookup failed for {user_id}: {e}");
                    HELP_TEXT.to_string()
                }
            },
            BotCommand::NextAppointment => match self.appointments.next_for_client(user_id).await {
                Ok(Some(appointment)) => format!(
                    "Your next session is on {}{}",
                    appointment.starts_at.format("%A %d %b, %H:%M UTC"),
                    appointment
                        .location
                        .map(|l| format!(" at {l}"))
                        .unwrap_or_default()
                ),
                Ok(None) => "You have no upcoming sessions scheduled.".to_string(),
                Err(e) => {
                    error!("appointment lookup failed for {user_id}: {e}");
                    HELP_TEXT.to_string()
                }
            },
            BotCommand::Help => HELP_TEXT.to_string(),
        };

        Ok(reply)
    }

    /// Resolve a phone number to a known user. Numbers are matched on their
    /// trailing digits so stored local formats still line up.
    async fn user_for_phone(&self, phone: &str) -> anyhow::Result<Option<Uuid>> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Ok(None);
        }

        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM users
             WHERE phone IS NOT NULL
               AND regexp_replace(phone, '\\D', '', 'g') = $1",
        )
        .bind(&digits)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn log_message(
        &self,
        user_id: Option<Uuid>,
        phone: &str,
        direction: MessageDirection,
        body: &str,
        wa_message_id: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO whatsapp_messages (id, user_id, phone, direction, body, wa_message_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(phone)
        .bind(direction)
        .bind(body)
        .bind(wa_message_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Flatten the nested webhook payload into its text messages
pub fn extract_text_messages(payload: &WebhookPayload) -> Vec<InboundMessage> {
    payload
        .entry
        .iter()
        .flat_map(|entry| &entry.changes)
        .flat_map(|change| &change.value.messages)
        .filter(|message| message.message_type == "text" && message.text.is_some())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::NotificationService;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_command_parsing() {
        assert_eq!(command_for("rutina"), BotCommand::TodaysRoutine);
        assert_eq!(command_for("  My ROUTINE please "), BotCommand::TodaysRoutine);
        assert_eq!(command_for("cita"), BotCommand::NextAppointment);
        assert_eq!(command_for("when is my next appointment?"), BotCommand::NextAppointment);
        assert_eq!(command_for("hola"), BotCommand::Help);
        assert_eq!(command_for(""), BotCommand::Help);
    }

    #[test]
    fn test_extract_text_messages() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [
                            {"from": "5491112345678", "id": "wamid.1", "type": "text",
                             "text": {"body": "rutina"}},
                            {"from": "5491112345678", "id": "wamid.2", "type": "image"}
                        ]
                    }
                }]
            }]
        }))
        .unwrap();

        let messages = extract_text_messages(&payload);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text.as_ref().unwrap().body, "rutina");
    }

    #[test]
    fn test_empty_payload_is_harmless() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(extract_text_messages(&payload).is_empty());
    }

    fn service_against(server_url: &str, db: PgPool) -> WhatsAppService {
        let config = WhatsAppConfig {
            api_base: server_url.to_string(),
            phone_number_id: "123".to_string(),
            access_token: "token".to_string(),
            verify_token: "verify".to_string(),
        };
        let notifications = NotificationService::new(db.clone());
        let routines = RoutineService::new(db.clone(), notifications.clone());
        let appointments = AppointmentService::new(db.clone(), notifications);
        WhatsAppService::new(config, db, routines, appointments)
    }

    #[tokio::test]
    async fn test_send_text_posts_to_graph_api() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/123/messages"))
            .and(bearer_token("token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "wamid.out.1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let db = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        let service = service_against(&server.uri(), db);

        let message_id = service.send_text("5491112345678", "hello").await.unwrap();

        assert_eq!(message_id, "wamid.out.1");
    }

    #[tokio::test]
    async fn test_send_text_surfaces_api_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/123/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let db = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        let service = service_against(&server.uri(), db);

        let result = service.send_text("5491112345678", "hello").await;

        assert!(matches!(result, Err(WhatsAppError::Api(_))));
    }
}
