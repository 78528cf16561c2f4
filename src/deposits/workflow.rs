//! Client-side stages of a deposit.
//!
//! A deposit is a draft until the user uploads proof of payment. Each stage
//! is its own type, so the only way to reach a [`DepositSubmission`] (and
//! therefore a database row) is amount, then method, then agent, then proof.

use rust_decimal::Decimal;

use crate::amm::precision;
use crate::models::{AgentCandidate, WorkflowStage};

use super::DepositError;

pub struct AmountEntered;

pub struct MethodSelected {
    method: String,
}

pub struct AgentMatched {
    method: String,
    agent: AgentCandidate,
}

pub struct AwaitingProof {
    method: String,
    agent: AgentCandidate,
}

/// A deposit that exists only on the client.
pub struct DepositDraft<S> {
    amount: Decimal,
    state: S,
}

/// A completed draft, ready to be persisted.
#[derive(Debug, Clone)]
pub struct DepositSubmission {
    pub amount: Decimal,
    pub method: String,
    pub agent: AgentCandidate,
    pub proof_url: String,
}

impl<S> DepositDraft<S> {
    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl DepositDraft<AmountEntered> {
    pub fn new(amount: Decimal) -> Result<Self, DepositError> {
        let amount = precision::currency(amount);
        if amount <= Decimal::ZERO {
            return Err(DepositError::InvalidAmount(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            amount,
            state: AmountEntered,
        })
    }

    pub fn stage(&self) -> WorkflowStage {
        WorkflowStage::AmountEntered
    }

    pub fn select_method(self, method: impl Into<String>) -> DepositDraft<MethodSelected> {
        DepositDraft {
            amount: self.amount,
            state: MethodSelected {
                method: method.into(),
            },
        }
    }
}

impl DepositDraft<MethodSelected> {
    pub fn stage(&self) -> WorkflowStage {
        WorkflowStage::PaymentMethodSelected
    }

    pub fn method(&self) -> &str {
        &self.state.method
    }

    /// Attach the agent chosen by the matcher. The agent must serve the
    /// selected method.
    pub fn match_agent(
        self,
        agent: AgentCandidate,
    ) -> Result<DepositDraft<AgentMatched>, DepositError> {
        if agent.method != self.state.method {
            return Err(DepositError::NoAgentAvailable(self.state.method));
        }
        Ok(DepositDraft {
            amount: self.amount,
            state: AgentMatched {
                method: self.state.method,
                agent,
            },
        })
    }
}

impl DepositDraft<AgentMatched> {
    pub fn stage(&self) -> WorkflowStage {
        WorkflowStage::AgentMatched
    }

    pub fn agent(&self) -> &AgentCandidate {
        &self.state.agent
    }

    /// The user has seen the agent's account details and paid.
    pub fn await_proof(self) -> DepositDraft<AwaitingProof> {
        DepositDraft {
            amount: self.amount,
            state: AwaitingProof {
                method: self.state.method,
                agent: self.state.agent,
            },
        }
    }
}

impl DepositDraft<AwaitingProof> {
    pub fn stage(&self) -> WorkflowStage {
        WorkflowStage::AwaitingProofUpload
    }

    pub fn submit(self, proof_url: impl Into<String>) -> Result<DepositSubmission, DepositError> {
        let proof_url = proof_url.into();
        if proof_url.trim().is_empty() {
            return Err(DepositError::InvalidTransition {
                from: Some(WorkflowStage::AwaitingProofUpload),
                to: WorkflowStage::AwaitingAgentConfirmation,
            });
        }
        Ok(DepositSubmission {
            amount: self.amount,
            method: self.state.method,
            agent: self.state.agent,
            proof_url,
        })
    }
}
