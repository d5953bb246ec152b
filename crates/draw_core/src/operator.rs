//! Operator-facing seams: who is running the draw and how they confirm resets.

use shared::{domain::UserId, protocol::UserSummary};

pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> UserId;
}

impl IdentityProvider for UserId {
    fn current_user_id(&self) -> UserId {
        self.clone()
    }
}

impl IdentityProvider for UserSummary {
    fn current_user_id(&self) -> UserId {
        self.user_id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmRequest {
    /// Importing a new inventory while the old one carries prize stamps.
    ReplaceDrawnInventory,
    /// Starting a new draw while the inventory carries prize stamps.
    ClearPriorDraw,
    /// Deleting every coupon from the inventory.
    ClearInventory,
}

impl ConfirmRequest {
    pub fn title(self) -> &'static str {
        match self {
            ConfirmRequest::ReplaceDrawnInventory => "Existing Data Found",
            ConfirmRequest::ClearPriorDraw => "New Session",
            ConfirmRequest::ClearInventory => "Clear Coupons",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ConfirmRequest::ReplaceDrawnInventory => {
                "Previous draw data exists. Loading new coupons will clear all existing data. Continue?"
            }
            ConfirmRequest::ClearPriorDraw => {
                "Some draw prizes already found in data source. This operation will remove all previous prize stamps. Continue?"
            }
            ConfirmRequest::ClearInventory => {
                "This removes every coupon from the inventory, stamped or not. Continue?"
            }
        }
    }
}

pub trait OperatorPrompt: Send + Sync {
    fn confirm(&self, request: ConfirmRequest) -> bool;
}

/// Answers every confirmation the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl OperatorPrompt for FixedAnswer {
    fn confirm(&self, _request: ConfirmRequest) -> bool {
        self.0
    }
}
