//! Domain models for the marketplace core

pub mod crop;
pub mod order;
pub mod subscription;

pub use crop::CropQuote;
pub use order::{
    Address, DeliveryMethod, DeliveryWindow, DriverInfo, GeoCoordinates, LogisticsInfo,
    NotificationChannel, NotificationRecord, NotificationStatus, Order, OrderItem, OrderSource,
    OrderStatus, QualityRating, TrackingEntry, TrackingLocation,
};
pub use subscription::{
    Budget, CancellationDetails, DayOfWeek, DeliveredItem, DeliveryPreferences, DeliveryRecord,
    Flexibility, Frequency, NotificationPrefs, PauseRecord, Pricing, RecurringItem,
    SatisfactionRating, SeasonalBounds, Subscription, SubscriptionMetrics, SubscriptionStatus,
    TimeOfDay,
};
