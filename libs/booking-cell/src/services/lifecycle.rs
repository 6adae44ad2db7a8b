use tracing::{debug, warn};

use crate::models::{BookingError, BookingStatus};

/// Allowed booking status moves.
pub struct BookingLifecycle;

impl BookingLifecycle {
    pub fn valid_transitions(current: BookingStatus) -> &'static [BookingStatus] {
        match current {
            BookingStatus::Requested => &[BookingStatus::Pending, BookingStatus::Failed],
            BookingStatus::Pending => &[
                BookingStatus::Accepted,
                BookingStatus::Rejected,
                BookingStatus::Failed,
                BookingStatus::Pending,
            ],
            BookingStatus::Accepted => &[
                BookingStatus::Succeeded,
                BookingStatus::Failed,
                BookingStatus::Pending,
            ],
            BookingStatus::Rejected => &[BookingStatus::Pending],
            BookingStatus::Failed | BookingStatus::Succeeded => &[],
        }
    }

    pub fn is_terminal(status: BookingStatus) -> bool {
        Self::valid_transitions(status).is_empty()
    }

    pub fn validate_transition(current: BookingStatus, next: BookingStatus) -> Result<(), BookingError> {
        if !Self::valid_transitions(current).contains(&next) {
            warn!("Invalid booking transition attempted: {} -> {}", current, next);
            return Err(BookingError::InvalidTransition { from: current, to: next });
        }

        debug!("Booking transition validated: {} -> {}", current, next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn happy_path_is_allowed() {
        for (from, to) in [
            (BookingStatus::Requested, BookingStatus::Pending),
            (BookingStatus::Pending, BookingStatus::Accepted),
            (BookingStatus::Accepted, BookingStatus::Succeeded),
        ] {
            assert!(BookingLifecycle::validate_transition(from, to).is_ok());
        }
    }

    #[test]
    fn rejected_booking_can_only_be_rescheduled() {
        assert!(BookingLifecycle::validate_transition(BookingStatus::Rejected, BookingStatus::Pending).is_ok());
        assert_matches!(
            BookingLifecycle::validate_transition(BookingStatus::Rejected, BookingStatus::Accepted),
            Err(BookingError::InvalidTransition { from: BookingStatus::Rejected, to: BookingStatus::Accepted })
        );
    }

    #[test]
    fn requested_booking_cannot_be_accepted() {
        assert!(BookingLifecycle::validate_transition(BookingStatus::Requested, BookingStatus::Accepted).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(BookingLifecycle::is_terminal(BookingStatus::Failed));
        assert!(BookingLifecycle::is_terminal(BookingStatus::Succeeded));
        assert!(!BookingLifecycle::is_terminal(BookingStatus::Rejected));
        assert!(BookingLifecycle::validate_transition(BookingStatus::Succeeded, BookingStatus::Failed).is_err());
    }
}
