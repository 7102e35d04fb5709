//! Reminder and alert delivery through the parent-messaging bot.

pub mod dispatcher;
pub mod domain;
pub mod transport;

pub use dispatcher::{NotificationDispatcher, NotificationQueue};
pub use domain::{
    BatchReport, DeliveryStatus, DispatchReport, NotificationContext, NotificationJob,
    NotificationRoute,
};
pub use transport::{HttpNotificationTransport, NotificationError, NotificationTransport};
