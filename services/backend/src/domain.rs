// Domain layer modules
pub mod analytics;
pub mod attendee;
pub mod catering;
pub mod consultation;
pub mod menu;
pub mod order;
pub mod pagination;
pub mod scraper_config;
pub mod service_request;
pub mod showtime;
pub mod showtime_page;
pub mod subscription;
pub mod template;
pub mod upload;
pub mod validation;

// Re-exports
pub use analytics::{compute_analytics, AdminAnalytics, TopItem};
pub use attendee::{Attendee, AttendeeSearch, CheckInActions, Dashboard};
pub use catering::{CateringError, CateringRequest, CateringStatus, Contact};
pub use consultation::ConsultationRequest;
pub use menu::{ItemCategory, ItemError, ItemSpec, Menu, MenuHeader, MenuItem};
pub use order::{order_total, Order, OrderError, OrderLine, OrderRequest, OrderStatus, RequestedLine};
pub use pagination::{Page, PageRequest, PaginationError};
pub use scraper_config::ScraperConfig;
pub use service_request::ServiceRequestError;
pub use showtime::{
    filter_options, ScrapeRequest, ShowtimeFormat, ShowtimeOptions, ShowtimeSlot,
    TheaterShowtimes,
};
pub use showtime_page::extract_showtimes;
pub use subscription::{Plan, Portion, Subscription, SubscriptionChange, SubscriptionError, SubscriptionStatus};
pub use template::{merge_template_items, MenuTemplate, MergePlan, TemplateHeader};
pub use upload::UploadError;
