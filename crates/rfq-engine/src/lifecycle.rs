//! Status machines for RFQs and their quotes.
//!
//! ```text
//! RFQ:       active ──► closed
//!               └─────► cancelled
//! Response:  pending ──► accepted | rejected | countered
//!            countered ──(supplier revision)──► pending
//! ```
//!
//! Expiry is derived from time, not stored: an RFQ past `expires_at` is
//! treated as terminal even while its status still reads `active`.

use trade_core::{ResponseStatus, RfqStatus};

use crate::error::{RfqError, RfqResult};

/// Check a buyer/admin status change on an RFQ.
pub fn check_rfq_transition(current: RfqStatus, target: RfqStatus, expired: bool) -> RfqResult<()> {
    if current.is_terminal() {
        return Err(RfqError::InvalidState(format!(
            "RFQ is already {} and cannot change",
            current
        )));
    }
    if expired {
        return Err(RfqError::InvalidState("RFQ has expired".to_string()));
    }

    match (current, target) {
        (RfqStatus::Active, RfqStatus::Closed) | (RfqStatus::Active, RfqStatus::Cancelled) => {
            Ok(())
        }
        _ => Err(RfqError::InvalidState(format!(
            "cannot move RFQ from {} to {}",
            current, target
        ))),
    }
}

/// Check that an RFQ can take new quotes or decisions on existing ones.
pub fn check_rfq_open(status: RfqStatus, expired: bool) -> RfqResult<()> {
    if !status.accepts_responses() {
        return Err(RfqError::InvalidState(format!("RFQ is {}", status)));
    }
    if expired {
        return Err(RfqError::InvalidState("RFQ has expired".to_string()));
    }
    Ok(())
}

/// Check a buyer/admin decision on a quote.
pub fn check_response_decision(current: ResponseStatus, target: ResponseStatus) -> RfqResult<()> {
    match (current, target) {
        (ResponseStatus::Pending, ResponseStatus::Accepted)
        | (ResponseStatus::Pending, ResponseStatus::Rejected)
        | (ResponseStatus::Pending, ResponseStatus::Countered) => Ok(()),
        _ => Err(RfqError::InvalidState(format!(
            "cannot move response from {} to {}",
            current, target
        ))),
    }
}

/// Check that the supplier may still edit a quote.
pub fn check_revisable(current: ResponseStatus) -> RfqResult<()> {
    if current.is_open() {
        Ok(())
    } else {
        Err(RfqError::InvalidState(format!(
            "response is {} and can no longer be revised",
            current
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFQ_STATUSES: [RfqStatus; 5] = [
        RfqStatus::Draft,
        RfqStatus::Submitted,
        RfqStatus::Active,
        RfqStatus::Closed,
        RfqStatus::Cancelled,
    ];

    const RESPONSE_STATUSES: [ResponseStatus; 4] = [
        ResponseStatus::Pending,
        ResponseStatus::Accepted,
        ResponseStatus::Rejected,
        ResponseStatus::Countered,
    ];

    #[test]
    fn test_active_can_close_or_cancel() {
        assert!(check_rfq_transition(RfqStatus::Active, RfqStatus::Closed, false).is_ok());
        assert!(check_rfq_transition(RfqStatus::Active, RfqStatus::Cancelled, false).is_ok());
        assert!(check_rfq_transition(RfqStatus::Active, RfqStatus::Draft, false).is_err());
        assert!(check_rfq_transition(RfqStatus::Active, RfqStatus::Active, false).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for current in [RfqStatus::Closed, RfqStatus::Cancelled] {
            for target in RFQ_STATUSES {
                assert!(matches!(
                    check_rfq_transition(current, target, false),
                    Err(RfqError::InvalidState(_))
                ));
            }
        }
    }

    #[test]
    fn test_expired_rfq_is_terminal() {
        assert!(matches!(
            check_rfq_transition(RfqStatus::Active, RfqStatus::Closed, true),
            Err(RfqError::InvalidState(_))
        ));
        assert!(check_rfq_open(RfqStatus::Active, true).is_err());
    }

    #[test]
    fn test_open_statuses() {
        assert!(check_rfq_open(RfqStatus::Active, false).is_ok());
        assert!(check_rfq_open(RfqStatus::Submitted, false).is_ok());
        for status in [RfqStatus::Draft, RfqStatus::Closed, RfqStatus::Cancelled] {
            assert!(matches!(
                check_rfq_open(status, false),
                Err(RfqError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_only_pending_responses_are_decided() {
        for target in [
            ResponseStatus::Accepted,
            ResponseStatus::Rejected,
            ResponseStatus::Countered,
        ] {
            assert!(check_response_decision(ResponseStatus::Pending, target).is_ok());
        }
        assert!(check_response_decision(ResponseStatus::Pending, ResponseStatus::Pending).is_err());

        for current in [
            ResponseStatus::Accepted,
            ResponseStatus::Rejected,
            ResponseStatus::Countered,
        ] {
            for target in RESPONSE_STATUSES {
                assert!(check_response_decision(current, target).is_err());
            }
        }
    }

    #[test]
    fn test_revisable() {
        assert!(check_revisable(ResponseStatus::Pending).is_ok());
        assert!(check_revisable(ResponseStatus::Countered).is_ok());
        assert!(check_revisable(ResponseStatus::Accepted).is_err());
        assert!(check_revisable(ResponseStatus::Rejected).is_err());
    }
}
