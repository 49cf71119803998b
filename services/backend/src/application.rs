// Application layer modules
pub mod admin_menu_handler;
pub mod analytics_handler;
pub mod api;
pub mod attendee_handler;
pub mod auth;
pub mod catering_handler;
pub mod clock;
pub mod consultation_handler;
pub mod inventory_handler;
pub mod menu_handler;
pub mod order_handler;
pub mod scrape_handler;
pub mod service_request_handler;
pub mod showtime_handler;
pub mod showtime_scraper;
pub mod subscription_handler;
pub mod template_handler;
pub mod upload_handler;

// Re-exports
pub use admin_menu_handler::{AdminMenuHandler, MenuSummary};
pub use analytics_handler::AnalyticsHandler;
pub use api::{ApiError, ApiRequest, ApiResponse};
pub use attendee_handler::AttendeeHandler;
pub use auth::{require_admin, require_customer, Admin, Customer};
pub use catering_handler::CateringHandler;
pub use consultation_handler::ConsultationHandler;
pub use inventory_handler::InventoryHandler;
pub use menu_handler::MenuViewHandler;
pub use order_handler::OrderHandler;
pub use scrape_handler::{ScrapeSummary, ScrapeWorkerHandler};
pub use service_request_handler::ServiceRequestHandler;
pub use showtime_handler::{ShowtimeEnqueueHandler, ShowtimeQueryHandler};
pub use showtime_scraper::{DailyShowtimes, ShowtimeScraper};
pub use subscription_handler::SubscriptionHandler;
pub use template_handler::TemplateHandler;
pub use upload_handler::UploadUrlHandler;
