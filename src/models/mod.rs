// Data models and request/response types

pub mod appointment;
pub mod billing;
pub mod exercise;
pub mod message;
pub mod notification;
pub mod nutrition;
pub mod profile;
pub mod progress;
pub mod reminder;
pub mod routine;

pub use appointment::*;
pub use billing::*;
pub use exercise::*;
pub use message::*;
pub use notification::*;
pub use nutrition::*;
pub use profile::*;
pub use progress::*;
pub use reminder::*;
pub use routine::*;
