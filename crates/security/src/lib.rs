//! Security mediation for Tamalebot: the policy decision point, the
//! append-only audit journal, and the encrypted credential vault.
//!
//! Everything an agent does to the outside world passes through this crate
//! twice — once to ask permission, once to leave a record.

pub mod audit;
pub mod policy;
pub mod vault;

pub use audit::{AuditDecision, AuditEntry, AuditJournal, EntryFilter};
pub use policy::PolicyEngine;
pub use vault::{CredentialMeta, CredentialType, CredentialVault, mask_value};
