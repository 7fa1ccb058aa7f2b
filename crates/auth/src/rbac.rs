//! Role-based access control.
//!
//! Every guarded operation declares the set of roles allowed to invoke it.
//! Ownership rules (a buyer may only close their own RFQ) live with the
//! operation itself; this table only answers "may this role try".

use serde::{Deserialize, Serialize};
use trade_core::Role;

use crate::error::{AuthError, AuthResult};

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    // RFQs
    ListOwnRfqs,
    CreateRfq,
    ViewRfq,
    UpdateRfqStatus,
    ListOpenRfqs,

    // Quotes
    CreateResponse,
    ListResponses,
    ReviseResponse,
    DecideResponse,

    // Admin
    AdminListRfqs,
    AdminDeleteRfq,
}

const BUYER_ADMIN: &[Role] = &[Role::Buyer, Role::Admin];
const SUPPLIER_ADMIN: &[Role] = &[Role::Supplier, Role::Admin];
const BUYER_SUPPLIER_ADMIN: &[Role] = &[Role::Buyer, Role::Supplier, Role::Admin];
const BUYER_ONLY: &[Role] = &[Role::Buyer];
const SUPPLIER_ONLY: &[Role] = &[Role::Supplier];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListOwnRfqs => "list_own_rfqs",
            Operation::CreateRfq => "create_rfq",
            Operation::ViewRfq => "view_rfq",
            Operation::UpdateRfqStatus => "update_rfq_status",
            Operation::ListOpenRfqs => "list_open_rfqs",
            Operation::CreateResponse => "create_response",
            Operation::ListResponses => "list_responses",
            Operation::ReviseResponse => "revise_response",
            Operation::DecideResponse => "decide_response",
            Operation::AdminListRfqs => "admin_list_rfqs",
            Operation::AdminDeleteRfq => "admin_delete_rfq",
        }
    }

    /// The allow-set for this operation.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::ListOwnRfqs => BUYER_ADMIN,
            Operation::CreateRfq => BUYER_ONLY,
            Operation::ViewRfq => BUYER_SUPPLIER_ADMIN,
            Operation::UpdateRfqStatus => BUYER_ADMIN,
            Operation::ListOpenRfqs => SUPPLIER_ADMIN,
            Operation::CreateResponse => SUPPLIER_ONLY,
            Operation::ListResponses => BUYER_SUPPLIER_ADMIN,
            Operation::ReviseResponse => SUPPLIER_ONLY,
            Operation::DecideResponse => BUYER_ADMIN,
            Operation::AdminListRfqs => ADMIN_ONLY,
            Operation::AdminDeleteRfq => ADMIN_ONLY,
        }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

/// Fail with `Forbidden` unless the role is in the operation's allow-set.
pub fn authorize(role: Role, operation: Operation) -> AuthResult<()> {
    if operation.permits(role) {
        Ok(())
    } else {
        tracing::debug!(role = %role, operation = operation.as_str(), "Role not permitted");
        Err(AuthError::Forbidden(format!(
            "role '{}' may not perform {}",
            role,
            operation.as_str()
        )))
    }
}
