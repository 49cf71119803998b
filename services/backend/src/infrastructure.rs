// Infrastructure layer modules
pub mod attendee_repository;
pub mod catering_repository;
pub mod config;
pub mod dynamo_support;
pub mod logging;
pub mod mail_config;
pub mod mailer;
pub mod menu_repository;
pub mod order_repository;
pub mod page_fetcher;
pub mod queue_config;
pub mod service_request_repository;
pub mod showtime_queue;
pub mod showtime_repository;
pub mod subscription_repository;
pub mod template_repository;
pub mod upload_config;
pub mod upload_signer;

// Re-exports
pub use attendee_repository::{AttendeeRepository, DynamoAttendeeRepository};
pub use catering_repository::{CateringRepository, DynamoCateringRepository};
pub use config::{load_aws_config, ConfigError, TableConfig, TableKind};
pub use dynamo_support::RepositoryError;
pub use logging::{init_cli_logging, init_logging};
pub use mail_config::MailConfig;
pub use mailer::{MailError, Mailer, PlainEmail, SesMailer};
pub use menu_repository::{DynamoMenuRepository, ItemWrite, MenuRepository};
pub use order_repository::{DynamoOrderRepository, OrderRepository, PlaceOrderError};
pub use page_fetcher::{FetchError, HttpPageFetcher, PageFetcher};
pub use queue_config::QueueConfig;
pub use service_request_repository::{
    DynamoServiceRequestRepository, ServiceRecord, ServiceRequestRepository,
};
pub use showtime_queue::{QueueError, ShowtimeQueue, SqsShowtimeQueue};
pub use showtime_repository::{DynamoShowtimeRepository, ShowtimeRepository};
pub use subscription_repository::{DynamoSubscriptionRepository, SubscriptionRepository};
pub use template_repository::{DynamoTemplateRepository, TemplateRepository};
pub use upload_config::{UploadConfig, UploadSettings};
pub use upload_signer::{S3UploadSigner, SignError, UploadUrlSigner};
