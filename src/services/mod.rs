// Business logic services

pub mod appointment_service;
pub mod client_service;
pub mod email_service;
pub mod exercise_service;
pub mod notification_service;
pub mod nutrition_service;
pub mod objective_rules;
pub mod payment_service;
pub mod progress_service;
pub mod reminder_scheduler;
pub mod reminder_service;
pub mod routine_generator_service;
pub mod routine_service;
pub mod trainer_service;
pub mod user_service;
pub mod whatsapp_service;

pub use appointment_service::AppointmentService;
pub use client_service::ClientService;
pub use email_service::{EmailKind, EmailService};
pub use exercise_service::ExerciseService;
pub use notification_service::NotificationService;
pub use nutrition_service::NutritionService;
pub use payment_service::{PaymentService, SignatureValidation, WebhookOutcome};
pub use progress_service::ProgressService;
pub use reminder_scheduler::ReminderScheduler;
pub use reminder_service::ReminderService;
pub use routine_generator_service::RoutineGeneratorService;
pub use routine_service::RoutineService;
pub use trainer_service::TrainerService;
pub use user_service::UserService;
pub use whatsapp_service::{WhatsAppService, WebhookPayload};
