//! The eight built-in policies, in evaluation order.

pub mod consultation;
pub mod dangerous_command;
pub mod file_restriction;
pub mod git_worktree;
pub mod governance;
pub mod recitation;
pub mod session_init;
pub mod tdd;

pub use consultation::{AgentConsultation, record_consultation};
pub use dangerous_command::DangerousCommand;
pub use file_restriction::FileRestriction;
pub use git_worktree::GitWorktreeSafety;
pub use governance::{FeatureGovernance, FeatureProgress};
pub use recitation::{RecitationLevel, RecitationLoop};
pub use session_init::SessionInitialization;
pub use tdd::TestDrivenDevelopment;

use crate::config::GateConfig;
use crate::policy::Policy;

/// Every policy, compiled from `config`, in the fixed priority order.
pub fn standard(config: &GateConfig) -> Vec<Box<dyn Policy>> {
    vec![
        Box::new(FileRestriction::new(config)),
        Box::new(DangerousCommand::new(config)),
        Box::new(GitWorktreeSafety::new(config)),
        Box::new(SessionInitialization::new()),
        Box::new(FeatureGovernance::new()),
        Box::new(TestDrivenDevelopment::new(config)),
        Box::new(AgentConsultation::new()),
        Box::new(RecitationLoop::new(config)),
    ]
}
