pub mod credentials;
pub mod events;
pub mod job;
pub mod seller;
pub mod supervisor;

pub use credentials::MarketplaceCredentials;
pub use events::{forward_events, EventKind, EventLine, JobRegistry};
pub use job::{Delivery, JobCall, JobPhase, LocalJob, MarketplaceJob};
pub use seller::{JobOutcome, RetryPolicy, Seller, SkipReason};
pub use supervisor::{run_supervised, ChannelSource, JobEvent, JobSource, SupervisorStats};
