//! Read model views fed by committed events.

pub mod event_log;
pub mod low_stock;
pub mod order_notifications;

pub use event_log::EventLogView;
pub use low_stock::{LowStockAlert, LowStockView};
pub use order_notifications::{Notification, NotificationKind, OrderNotificationsView};
