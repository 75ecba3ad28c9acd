use anyhow::{anyhow, Result};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{
    CreateNotification, NotificationPriority, NotificationType, Reminder, ReminderChannel,
};
use crate::services::{
    AppointmentService, EmailKind, EmailService, NotificationService, ReminderService,
    WhatsAppService,
};

/// Recipient data needed to deliver a reminder over any channel
#[derive(Debug, sqlx::FromRow)]
struct Recipient {
    id: Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
}

/// Cron-driven dispatcher: due reminders every minute, appointment reminders
/// daily, subscription expiry sweep nightly.
#[derive(Clone)]
pub struct ReminderScheduler {
    db: PgPool,
    reminders: ReminderService,
    notifications: NotificationService,
    appointments: AppointmentService,
    email: EmailService,
    whatsapp: WhatsAppService,
}

impl ReminderScheduler {
    pub fn new(
        db: PgPool,
        reminders: ReminderService,
        notifications: NotificationService,
        appointments: AppointmentService,
        email: EmailService,
        whatsapp: WhatsAppService,
    ) -> Self {
        Self {
            db,
            reminders,
            notifications,
            appointments,
            email,
            whatsapp,
        }
    }

    /// Build and start the job scheduler. The returned handle must be kept
    /// alive for the jobs to keep firing.
    pub async fn start(&self) -> Result<JobScheduler> {
        let mut scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("failed to create job scheduler: {e}"))?;

        let this = self.clone();
        scheduler
            .add(
                Job::new_async("0 * * * * *", move |_uuid, _lock| {
                    let this = this.clone();
                    Box::pin(async move {
                        match this.dispatch_due_reminders().await {
                            Ok(0) => {}
                            Ok(count) => info!("dispatched {count} due reminders"),
                            Err(e) => error!("reminder dispatch failed: {e:#}"),
                        }
                    })
                })
                .map_err(|e| anyhow!("failed to create reminder job: {e}"))?,
            )
            .await
            .map_err(|e| anyhow!("failed to add reminder job: {e}"))?;

        let this = self.clone();
        scheduler
            .add(
                Job::new_async("0 0 8 * * *", move |_uuid, _lock| {
                    let this = this.clone();
                    Box::pin(async move {
                        match this.send_appointment_reminders().await {
                            Ok(0) => {}
                            Ok(count) => info!("sent {count} appointment reminders"),
                            Err(e) => error!("appointment reminder pass failed: {e:#}"),
                        }
                    })
                })
                .map_err(|e| anyhow!("failed to create appointment job: {e}"))?,
            )
            .await
            .map_err(|e| anyhow!("failed to add appointment job: {e}"))?;

        let this = self.clone();
        scheduler
            .add(
                Job::new_async("0 10 3 * * *", move |_uuid, _lock| {
                    let this = this.clone();
                    Box::pin(async move {
                        match this.sweep_expired_subscriptions().await {
                            Ok(0) => {}
                            Ok(count) => info!("marked {count} subscriptions expired"),
                            Err(e) => error!("subscription sweep failed: {e:#}"),
                        }
                    })
                })
                .map_err(|e| anyhow!("failed to create subscription job: {e}"))?,
            )
            .await
            .map_err(|e| anyhow!("failed to add subscription job: {e}"))?;

        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("failed to start job scheduler: {e}"))?;

        info!("reminder scheduler started");

        Ok(scheduler)
    }

    /// Deliver every due reminder over its configured channels
    pub async fn dispatch_due_reminders(&self) -> Result<usize> {
        let due = self.reminders.due_reminders().await?;
        let mut dispatched = 0;

        for reminder in due {
            // Claim the row first; a second dispatcher pass sees it sent
            if !self.reminders.mark_sent(reminder.id).await? {
                continue;
            }

            if let Err(e) = self.deliver(&reminder).await {
                error!("delivery of reminder {} failed: {e:#}", reminder.id);
            }
            dispatched += 1;
        }

        Ok(dispatched)
    }

    async fn deliver(&self, reminder: &Reminder) -> Result<()> {
        let recipient_id = reminder.client_id.unwrap_or(reminder.owner_id);
        let Some(recipient) = self.recipient(recipient_id).await? else {
            return Err(anyhow!("reminder recipient {recipient_id} no longer exists"));
        };

        for channel in &reminder.channels {
            match channel {
                ReminderChannel::InApp => {
                    self.notifications
                        .notify(CreateNotification {
                            user_id: recipient.id,
                            notification_type: NotificationType::ReminderDue,
                            priority: NotificationPriority::Medium,
                            title: "Reminder".to_string(),
                            body: reminder.message.clone(),
                            data: Some(serde_json::json!({ "reminder_id": reminder.id })),
                        })
                        .await?;
                }
                ReminderChannel::Email => {
                    if let Err(e) = self
                        .email
                        .send(
                            &recipient.email,
                            &recipient.full_name,
                            EmailKind::Reminder,
                            &[
                                ("user_name", recipient.full_name.as_str()),
                                ("message", reminder.message.as_str()),
                            ],
                        )
                        .await
                    {
                        error!("reminder email to {} failed: {e}", recipient.email);
                    }
                }
                ReminderChannel::Whatsapp => {
                    let Some(phone) = &recipient.phone else {
                        continue;
                    };
                    if let Err(e) = self.whatsapp.send_text(phone, &reminder.message).await {
                        error!("reminder whatsapp to {phone} failed: {e}");
                    }
                }
            }
        }

        Ok(())
    }

    /// Notify clients of appointments starting within the next 24 hours
    pub async fn send_appointment_reminders(&self) -> Result<usize> {
        let upcoming = self.appointments.due_within_next_day().await?;
        let mut sent = 0;

        for appointment in upcoming {
            let Some(client) = self.recipient(appointment.client_id).await? else {
                continue;
            };

            let when = appointment.starts_at.format("%A %d %b, %H:%M UTC").to_string();
            let location = appointment.location.clone().unwrap_or_else(|| "-".to_string());

            self.notifications
                .notify(CreateNotification {
                    user_id: client.id,
                    notification_type: NotificationType::AppointmentReminder,
                    priority: NotificationPriority::Medium,
                    title: "Upcoming session".to_string(),
                    body: format!("You have a session on {when}"),
                    data: Some(serde_json::json!({ "appointment_id": appointment.id })),
                })
                .await?;

            if let Err(e) = self
                .email
                .send(
                    &client.email,
                    &client.full_name,
                    EmailKind::AppointmentReminder,
                    &[
                        ("user_name", client.full_name.as_str()),
                        ("appointment_time", when.as_str()),
                        ("location", location.as_str()),
                    ],
                )
                .await
            {
                error!("appointment reminder email to {} failed: {e}", client.email);
            }

            sent += 1;
        }

        Ok(sent)
    }

    /// Mark lapsed subscriptions expired and notify their trainers
    pub async fn sweep_expired_subscriptions(&self) -> Result<usize> {
        let expired: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            "UPDATE subscriptions SET status = 'expired', updated_at = NOW()
             WHERE status = 'active' AND current_period_end < NOW()
             RETURNING id, trainer_id, plan_name",
        )
        .fetch_all(&self.db)
        .await?;

        for (subscription_id, trainer_id, plan_name) in &expired {
            self.notifications
                .notify(CreateNotification {
                    user_id: *trainer_id,
                    notification_type: NotificationType::SubscriptionExpired,
                    priority: NotificationPriority::High,
                    title: "Subscription expired".to_string(),
                    body: format!("A client subscription to \"{plan_name}\" has lapsed"),
                    data: Some(serde_json::json!({ "subscription_id": subscription_id })),
                })
                .await?;
        }

        Ok(expired.len())
    }

    async fn recipient(&self, user_id: Uuid) -> Result<Option<Recipient>> {
        let recipient = sqlx::query_as::<_, Recipient>(
            "SELECT id, email, full_name, phone FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(recipient)
    }
}
