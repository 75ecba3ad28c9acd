use anyhow::Result;
use sqlx::PgPool;

use crate::auth::AuthService;
use crate::config::{AppConfig, PaymentConfig, SmtpConfig, WhatsAppConfig};
use crate::services::{
    AppointmentService, ClientService, EmailService, ExerciseService, NotificationService,
    NutritionService, PaymentService, ProgressService, ReminderScheduler, ReminderService,
    RoutineGeneratorService, RoutineService, TrainerService, UserService, WhatsAppService,
};

/// Shared application state handed to every router
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthService,
    pub users: UserService,
    pub clients: ClientService,
    pub trainers: TrainerService,
    pub exercises: ExerciseService,
    pub routines: RoutineService,
    pub generator: RoutineGeneratorService,
    pub payments: PaymentService,
    pub appointments: AppointmentService,
    pub reminders: ReminderService,
    pub notifications: NotificationService,
    pub progress: ProgressService,
    pub nutrition: NutritionService,
    pub email: EmailService,
    pub whatsapp: WhatsAppService,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: AppConfig,
        smtp: SmtpConfig,
        whatsapp: WhatsAppConfig,
        payments: PaymentConfig,
    ) -> Result<Self> {
        let notifications = NotificationService::new(db.clone());
        let routines = RoutineService::new(db.clone(), notifications.clone());
        let appointments = AppointmentService::new(db.clone(), notifications.clone());
        let email = EmailService::new(smtp)?;
        let whatsapp = WhatsAppService::new(
            whatsapp,
            db.clone(),
            routines.clone(),
            appointments.clone(),
        );

        Ok(Self {
            auth: AuthService::new(db.clone(), &config.jwt_secret),
            users: UserService::new(db.clone()),
            clients: ClientService::new(db.clone(), notifications.clone()),
            trainers: TrainerService::new(db.clone()),
            exercises: ExerciseService::new(db.clone()),
            generator: RoutineGeneratorService::new(db.clone()),
            payments: PaymentService::new(
                db.clone(),
                notifications.clone(),
                payments.webhook_secret,
            ),
            reminders: ReminderService::new(db.clone()),
            progress: ProgressService::new(db.clone()),
            nutrition: NutritionService::new(db),
            routines,
            appointments,
            notifications,
            email,
            whatsapp,
            config,
        })
    }

    /// State wired against an unconnected pool, for handler tests that never
    /// reach the database
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let db = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        Self::new(
            db,
            AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                jwt_secret: "test-secret".to_string(),
                public_url: "http://localhost:3000".to_string(),
                upload_dir: "uploads".to_string(),
            },
            SmtpConfig {
                host: "localhost".to_string(),
                port: 587,
                username: String::new(),
                password: String::new(),
                from_email: "noreply@trainerhub.app".to_string(),
                from_name: "TrainerHub".to_string(),
            },
            WhatsAppConfig {
                api_base: "http://localhost:0".to_string(),
                phone_number_id: "123".to_string(),
                access_token: "token".to_string(),
                verify_token: "verify-secret".to_string(),
            },
            PaymentConfig {
                webhook_secret: "whsec_test".to_string(),
            },
        )
        .unwrap()
    }

    /// Build the scheduler over this state's services
    pub fn scheduler(&self, db: PgPool) -> ReminderScheduler {
        ReminderScheduler::new(
            db,
            self.reminders.clone(),
            self.notifications.clone(),
            self.appointments.clone(),
            self.email.clone(),
            self.whatsapp.clone(),
        )
    }
}
