//! Account lockout guard.
//!
//! Pure state machine tracking failed verification attempts and a time-boxed
//! lockout. The same guard protects admin logins and store-edit credential
//! logins; only the policy parameters differ. Persistence is the caller's
//! job - the guard computes the next state and the outcome to surface.

use chrono::{DateTime, Duration, Utc};

/// Lockout policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trip the lockout.
    pub max_attempts: i32,
    /// How long the account stays locked.
    pub lockout_minutes: i64,
}

impl LockoutPolicy {
    /// Policy for admin accounts: 5 attempts, 30 minute lockout.
    pub const ADMIN: Self = Self {
        max_attempts: 5,
        lockout_minutes: 30,
    };

    /// Policy for store-edit credentials: 5 attempts, 15 minute lockout.
    pub const EDIT_CREDENTIAL: Self = Self {
        max_attempts: 5,
        lockout_minutes: 15,
    };
}

/// Lockout-relevant fields of an account record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Outcome of a failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempt recorded; the account is still open.
    Failed {
        /// `max(0, max_attempts - failed_attempts)`, surfaced to the client
        /// as a countdown.
        attempts_remaining: i32,
    },
    /// The failure threshold was reached; the account is now locked.
    LockedOut { locked_until: DateTime<Utc> },
}

/// Minutes until an active lockout elapses, rounded up so a caller never
/// shows "0 minutes remaining" while still locked.
#[must_use]
pub fn remaining_minutes(locked_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (locked_until - now).num_seconds().max(0);
    (seconds + 59) / 60
}

/// Check whether the account is currently locked.
///
/// Must be consulted before the secret is verified: a locked account rejects
/// attempts without touching the password hash.
///
/// # Errors
///
/// Returns the remaining lockout minutes when the account is locked.
pub fn check(state: LockoutState, now: DateTime<Utc>) -> Result<(), i64> {
    match state.locked_until {
        Some(until) if until > now => Err(remaining_minutes(until, now)),
        _ => Ok(()),
    }
}

/// Compute the state and outcome after a failed verification. A successful
/// verification resets the counter and clears the lockout in one repository
/// update; no transition function is needed for it.
#[must_use]
pub fn on_failure(
    policy: LockoutPolicy,
    state: LockoutState,
    now: DateTime<Utc>,
) -> (LockoutState, FailureOutcome) {
    let failed_attempts = state.failed_attempts + 1;

    if failed_attempts >= policy.max_attempts {
        let locked_until = now + Duration::minutes(policy.lockout_minutes);
        (
            LockoutState {
                failed_attempts,
                locked_until: Some(locked_until),
            },
            FailureOutcome::LockedOut { locked_until },
        )
    } else {
        (
            LockoutState {
                failed_attempts,
                locked_until: None,
            },
            FailureOutcome::Failed {
                attempts_remaining: (policy.max_attempts - failed_attempts).max(0),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minute: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + minute * 60, 0).expect("valid timestamp")
    }

    #[test]
    fn test_open_account_passes_check() {
        assert!(check(LockoutState::default(), at(0)).is_ok());
    }

    #[test]
    fn test_locked_account_rejects_without_verification() {
        let state = LockoutState {
            failed_attempts: 5,
            locked_until: Some(at(30)),
        };
        assert_eq!(check(state, at(0)), Err(30));
    }

    #[test]
    fn test_lockout_elapses() {
        let state = LockoutState {
            failed_attempts: 5,
            locked_until: Some(at(30)),
        };
        assert!(check(state, at(30)).is_ok());
        assert!(check(state, at(31)).is_ok());
    }

    #[test]
    fn test_remaining_minutes_rounds_up() {
        let until = at(0) + Duration::seconds(61);
        assert_eq!(remaining_minutes(until, at(0)), 2);
        assert_eq!(remaining_minutes(at(0), at(5)), 0);
    }

    #[test]
    fn test_failure_countdown() {
        let mut state = LockoutState::default();
        // Four wrong passwords with max_attempts = 5: last one shows 1 left.
        for expected_remaining in [4, 3, 2, 1] {
            let (next, outcome) = on_failure(LockoutPolicy::ADMIN, state, at(0));
            state = next;
            assert_eq!(
                outcome,
                FailureOutcome::Failed {
                    attempts_remaining: expected_remaining
                }
            );
            assert!(state.locked_until.is_none());
        }
        assert_eq!(state.failed_attempts, 4);
    }

    #[test]
    fn test_fifth_failure_locks_for_thirty_minutes() {
        let state = LockoutState {
            failed_attempts: 4,
            locked_until: None,
        };
        let (next, outcome) = on_failure(LockoutPolicy::ADMIN, state, at(0));
        assert_eq!(next.failed_attempts, 5);
        assert_eq!(
            outcome,
            FailureOutcome::LockedOut {
                locked_until: at(30)
            }
        );
        assert_eq!(check(next, at(10)), Err(20));
    }

    #[test]
    fn test_edit_credential_uses_shorter_window() {
        let state = LockoutState {
            failed_attempts: 4,
            locked_until: None,
        };
        let (next, _) = on_failure(LockoutPolicy::EDIT_CREDENTIAL, state, at(0));
        assert_eq!(next.locked_until, Some(at(15)));
    }
}
