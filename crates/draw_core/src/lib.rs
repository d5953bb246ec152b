//! Draw-number selection and inventory consistency for the lucky draw.
//!
//! Validator -> selector -> committer, driven by [`session::DrawSession`] over
//! the [`store`] seams. Persistence lives in the `storage` crate.

pub mod committer;
pub mod importer;
pub mod memory;
pub mod operator;
pub mod selector;
pub mod session;
pub mod settings;
pub mod store;
pub mod validator;
pub mod worker;

pub use committer::commit;
pub use importer::{CandidateImporter, CsvImporter, StaticImporter};
pub use memory::MemoryStore;
pub use operator::{ConfirmRequest, FixedAnswer, IdentityProvider, OperatorPrompt};
pub use selector::select_prize_numbers;
pub use session::{DrawSession, ImportOutcome, PrepareOutcome, RevealStep, SessionState};
pub use settings::{load_requirements, save_requirements, validate_requirements};
pub use store::{
    ApplyCommitError, CommitPlan, CommitReceipt, CouponStamp, CouponStore, DrawStore,
    PrizeLogStore, RequirementsStore,
};
pub use validator::{validate_inventory, InventoryReport};
pub use worker::{StorageWorker, WorkerHandle, WorkerOptions};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
