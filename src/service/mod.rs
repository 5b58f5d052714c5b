pub mod daily;
pub mod handlers;
pub mod matching;
pub mod requests;

pub use daily::{DailyLuckService, DailyLuckSummary};
pub use handlers::{
    handle, handle_daily_luck, handle_deep_luck, DailyLuckResponse, DeepLuckResponse, RiskLevel,
    ServiceContext, ServiceOutcome,
};
pub use matching::{handle_agent_match, AgentMatchResponse, MatchHighlight, MatchPair, Verdict};
pub use requests::{AgentProfile, ReferenceBirth, Requirement, ServiceKind, ServicePrices};
