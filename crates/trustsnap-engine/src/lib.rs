//! trustsnap engine - release orchestration over the trust stores
//!
//! Provides high-level operations that coordinate the snapshot store, the
//! changelog and the audit log:
//! - `config`: expected UI version and optional `trustsnap.toml`
//! - `deploy_gate`: aggregate pre-release invariant checks
//! - `rollback`: eligibility-gated and emergency rollback, dry-run simulation

pub mod config;
pub mod deploy_gate;
pub mod rollback;

pub use config::{GateConfig, TrustConfig};
pub use deploy_gate::{DeployGate, DeployGateReport, GateCheck, GateHttpResult};
pub use rollback::{
    RollbackEffects, RollbackEligibility, RollbackManager, RollbackRequest, RollbackResult,
    RollbackSimulation,
};
