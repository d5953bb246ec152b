//! Draw Session Controller.
//!
//! Drives one draw run through `Idle -> InventoryLoaded -> ReadyToDraw ->
//! Drawing -> Committed`. The loaded inventory, the requirements snapshot and
//! the precomputed draw are owned by the session and passed explicitly to the
//! selector and committer. Nothing is written before the commit, so aborting
//! only discards memory.

use std::{collections::VecDeque, fmt, sync::Arc};

use rand::Rng;
use shared::{
    domain::{pad_coupon, CouponEntry, DrawResult, PrizeTier, Requirements, UserId},
    error::DrawError,
    protocol::{CommitOutcome, RevealedSlot},
};
use tracing::{debug, info, warn};

use crate::{
    committer,
    importer::CandidateImporter,
    operator::{ConfirmRequest, IdentityProvider, OperatorPrompt},
    selector::select_prize_numbers,
    settings::load_requirements,
    store::DrawStore,
    validator::{validate_inventory, InventoryReport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InventoryLoaded,
    ReadyToDraw,
    Drawing,
    Committed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::InventoryLoaded => "inventory-loaded",
            SessionState::ReadyToDraw => "ready-to-draw",
            SessionState::Drawing => "drawing",
            SessionState::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { count: usize },
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    Ready { cleared_stamps: u64 },
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    Slot(RevealedSlot),
    /// The final main slot was revealed and the draw committed.
    Completed {
        slot: RevealedSlot,
        outcome: CommitOutcome,
    },
}

/// Consolations first, then mains, each from the highest position down.
pub fn reveal_order(result: &DrawResult) -> Vec<RevealedSlot> {
    let slot = |tier: PrizeTier, index: usize, number: &String| RevealedSlot {
        tier,
        position: index + 1,
        label: tier.label(index + 1),
        coupon_number: number.clone(),
    };
    let consolations = result
        .consolation_prize_numbers
        .iter()
        .enumerate()
        .rev()
        .map(|(index, number)| slot(PrizeTier::Consolation, index, number));
    let mains = result
        .main_prize_numbers
        .iter()
        .enumerate()
        .rev()
        .map(|(index, number)| slot(PrizeTier::Main, index, number));
    consolations.chain(mains).collect()
}

pub struct DrawSession<S: DrawStore + ?Sized> {
    store: Arc<S>,
    operator: UserId,
    state: SessionState,
    requirements: Option<Requirements>,
    inventory: Vec<CouponEntry>,
    report: Option<InventoryReport>,
    draw: Option<DrawResult>,
    pending: VecDeque<RevealedSlot>,
    revealed: Vec<RevealedSlot>,
    outcome: Option<CommitOutcome>,
}

impl<S: DrawStore + ?Sized> DrawSession<S> {
    pub fn new(store: Arc<S>, identity: impl IdentityProvider) -> Self {
        Self {
            store,
            operator: identity.current_user_id(),
            state: SessionState::Idle,
            requirements: None,
            inventory: Vec::new(),
            report: None,
            draw: None,
            pending: VecDeque::new(),
            revealed: Vec::new(),
            outcome: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn operator(&self) -> &UserId {
        &self.operator
    }

    pub fn requirements(&self) -> Option<&Requirements> {
        self.requirements.as_ref()
    }

    pub fn inventory(&self) -> &[CouponEntry] {
        &self.inventory
    }

    pub fn report(&self) -> Option<&InventoryReport> {
        self.report.as_ref()
    }

    pub fn revealed(&self) -> &[RevealedSlot] {
        &self.revealed
    }

    pub fn remaining_slots(&self) -> usize {
        self.pending.len()
    }

    pub fn outcome(&self) -> Option<&CommitOutcome> {
        self.outcome.as_ref()
    }

    fn expect_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), DrawError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(DrawError::OutOfOrder {
                action,
                state: self.state.to_string(),
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "draw session transition");
        self.state = next;
    }

    fn reset_inventory(&mut self) {
        self.inventory.clear();
        self.report = None;
        self.requirements = None;
    }

    /// Replaces the stored coupon inventory with freshly imported candidates.
    ///
    /// The session returns to `Idle`; the new inventory has to be loaded before
    /// it can be drawn from.
    pub async fn import_inventory<I, P>(
        &mut self,
        importer: &I,
        prompt: &P,
    ) -> Result<ImportOutcome, DrawError>
    where
        I: CandidateImporter + ?Sized,
        P: OperatorPrompt + ?Sized,
    {
        self.expect_state("import inventory", &[SessionState::Idle, SessionState::InventoryLoaded])?;
        let requirements = load_requirements(self.store.as_ref()).await?;

        if self.store.has_prize_stamps().await? {
            if !prompt.confirm(ConfirmRequest::ReplaceDrawnInventory) {
                info!("operator kept the drawn inventory; import cancelled");
                return Ok(ImportOutcome::Declined);
            }
            warn!("replacing an inventory that carries prize stamps");
        }

        let candidates = importer
            .import_candidates()
            .await
            .map_err(|err| DrawError::Import(format!("{err:#}")))?;
        if candidates.is_empty() {
            return Err(DrawError::InventoryEmpty);
        }

        let normalized: Vec<String> = candidates
            .iter()
            .map(|raw| pad_coupon(raw, requirements.width()))
            .collect();
        self.store.replace_coupons(&normalized).await?;

        self.reset_inventory();
        self.transition(SessionState::Idle);
        info!(count = normalized.len(), "imported coupon inventory");
        Ok(ImportOutcome::Imported {
            count: normalized.len(),
        })
    }

    /// `Idle -> InventoryLoaded`. Empty and invalid inventories leave the session idle.
    pub async fn load_inventory(&mut self) -> Result<InventoryReport, DrawError> {
        self.expect_state("load inventory", &[SessionState::Idle, SessionState::InventoryLoaded])?;
        self.reset_inventory();
        self.transition(SessionState::Idle);

        let requirements = load_requirements(self.store.as_ref()).await?;
        let coupons = self.store.list_coupons().await?;
        let report = validate_inventory(
            coupons.iter().map(|entry| entry.coupon_number.as_str()),
            &requirements,
        );
        if let Err(err) = report.check_structure() {
            warn!(
                entries = report.entries,
                problematic = report.problematic.len(),
                "coupon inventory rejected: {err}"
            );
            return Err(err);
        }

        info!(
            entries = report.entries,
            distinct = report.distinct,
            required = report.required,
            "coupon inventory loaded"
        );
        self.inventory = coupons;
        self.requirements = Some(requirements);
        self.report = Some(report.clone());
        self.transition(SessionState::InventoryLoaded);
        Ok(report)
    }

    /// `InventoryLoaded -> ReadyToDraw`.
    ///
    /// Re-checks the inventory against the current requirements. Insufficiency
    /// blocks before any question is asked; prize stamps left by an earlier
    /// draw are cleared only after the operator confirms.
    pub async fn prepare<P>(&mut self, prompt: &P) -> Result<PrepareOutcome, DrawError>
    where
        P: OperatorPrompt + ?Sized,
    {
        self.expect_state("prepare the draw", &[SessionState::InventoryLoaded])?;

        let requirements = load_requirements(self.store.as_ref()).await?;
        let report = validate_inventory(
            self.inventory.iter().map(|entry| entry.coupon_number.as_str()),
            &requirements,
        );
        self.report = Some(report.clone());
        report.check()?;

        let mut cleared_stamps = 0;
        if self.store.has_prize_stamps().await? {
            if !prompt.confirm(ConfirmRequest::ClearPriorDraw) {
                info!("operator declined to clear previous prize stamps");
                return Ok(PrepareOutcome::Declined);
            }
            cleared_stamps = self.store.clear_prize_stamps().await?;
            for entry in &mut self.inventory {
                entry.prize_number = None;
            }
            info!(cleared = cleared_stamps, "cleared previous prize stamps");
        }

        self.requirements = Some(requirements);
        self.transition(SessionState::ReadyToDraw);
        Ok(PrepareOutcome::Ready { cleared_stamps })
    }

    /// `ReadyToDraw -> Drawing`. Runs the selector once; reveals play it back.
    pub async fn start_draw<R>(&mut self, rng: &mut R) -> Result<usize, DrawError>
    where
        R: Rng + ?Sized,
    {
        self.expect_state("start the draw", &[SessionState::ReadyToDraw])?;
        if self.store.has_prize_stamps().await? {
            self.transition(SessionState::InventoryLoaded);
            return Err(DrawError::ConflictingPriorDraw);
        }
        let requirements = self
            .requirements
            .as_ref()
            .ok_or(DrawError::ConfigurationMissing)?;

        let result = select_prize_numbers(&self.inventory, requirements, rng)?;
        info!(
            event_name = %requirements.event_name,
            slots = result.len(),
            "draw started"
        );

        self.pending = reveal_order(&result).into();
        self.revealed.clear();
        self.draw = Some(result);
        self.transition(SessionState::Drawing);
        Ok(self.pending.len())
    }

    /// Reveals the next slot. Revealing the last main slot commits the draw.
    pub async fn reveal_next(&mut self) -> Result<RevealStep, DrawError> {
        self.expect_state("reveal a prize", &[SessionState::Drawing])?;
        let Some(slot) = self.pending.pop_front() else {
            return Err(DrawError::OutOfOrder {
                action: "reveal a prize",
                state: "drawing with every slot revealed; retry the commit".to_string(),
            });
        };
        debug!(label = %slot.label, number = %slot.coupon_number, "revealed prize slot");
        self.revealed.push(slot.clone());

        if !self.pending.is_empty() {
            return Ok(RevealStep::Slot(slot));
        }
        let outcome = self.commit().await?;
        Ok(RevealStep::Completed { slot, outcome })
    }

    /// Commits the revealed draw exactly once.
    ///
    /// After a failed commit the session stays in `Drawing` and this may be
    /// called again; after a successful one it returns the recorded outcome.
    pub async fn commit(&mut self) -> Result<CommitOutcome, DrawError> {
        if let (SessionState::Committed, Some(outcome)) = (self.state, &self.outcome) {
            return Ok(outcome.clone());
        }
        self.expect_state("commit", &[SessionState::Drawing])?;
        if !self.pending.is_empty() {
            return Err(DrawError::OutOfOrder {
                action: "commit",
                state: format!("drawing with {} slots unrevealed", self.pending.len()),
            });
        }

        let (Some(result), Some(requirements)) = (&self.draw, &self.requirements) else {
            return Err(DrawError::OutOfOrder {
                action: "commit",
                state: self.state.to_string(),
            });
        };
        let outcome =
            committer::commit(self.store.as_ref(), result, requirements, &self.operator).await?;

        self.draw = None;
        self.outcome = Some(outcome.clone());
        self.transition(SessionState::Committed);
        Ok(outcome)
    }

    /// Discards the in-memory draw. A committed session is left untouched.
    pub fn abort(&mut self) {
        if self.state == SessionState::Committed {
            return;
        }
        if self.draw.is_some() {
            info!(revealed = self.revealed.len(), "draw aborted before commit");
        }
        self.draw = None;
        self.pending.clear();
        self.revealed.clear();
        self.reset_inventory();
        self.transition(SessionState::Idle);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
