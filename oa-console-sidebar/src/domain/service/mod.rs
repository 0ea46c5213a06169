pub mod reconciler;
pub mod sidebar_domain_service;

pub use reconciler::{MessageDecision, ReconcilePlan, TimerOp};
pub use sidebar_domain_service::{
    OpenConversationOutput, SidebarDomainConfig, SidebarDomainService, SidebarEffects,
};
