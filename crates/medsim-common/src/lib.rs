//! Shared types for the medical evacuation simulation engine
//!
//! Identity newtypes, the logical clock, and the error kind shared by every
//! `medsim-*` crate. Kept deliberately small: components take IDs and
//! explicit dependencies rather than reaching through back-pointers or
//! process-global singletons (see the orchestrator's ownership model).

pub mod clock;
pub mod error;
pub mod ids;

pub use clock::{SimDuration, SimInstant};
pub use error::{SimError, SimResult};
pub use ids::{FacilityId, JobId, MissionId, PatientId};
