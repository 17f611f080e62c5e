use crate::{Result, worker::Shared};

/// Where a submission stands after its latest failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// No failure yet.
    Ok,
    /// Failed once; one more attempt, then give up.
    Retry,
    /// Failed once; one more attempt, then discard queued work and the open session.
    Clean,
}

/// Runs `attempt` at most twice.
///
/// `escalation` is the status taken after the first failure, [`Status::Retry`]
/// or [`Status::Clean`]. `attempt` must leave the caller state as it found it
/// when it fails. Before each log line the worker is allowed to go idle so
/// the diagnostics stay in submission order.
pub(crate) fn with_retry<T>(
    shared: &Shared,
    action: &str,
    escalation: Status,
    mut attempt: impl FnMut() -> Result<T>,
) -> Option<T> {
    let mut status = Status::Ok;

    loop {
        let e = match attempt() {
            Ok(v) => return Some(v),
            Err(e) => e,
        };

        shared.wait_idle();

        match status {
            Status::Ok => {
                log::warn!("{action}: {e}. Try again...");
                status = escalation;
            }
            Status::Retry => {
                log::error!("{action}: {e}.");
                return None;
            }
            Status::Clean => {
                log::error!("{action}: {e}. Cleaning up video recorder...");
                shared.discard();
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecorderError;

    fn failure() -> RecorderError {
        RecorderError::FrameRequestFailed("busy".to_string())
    }

    #[test]
    fn test_second_attempt_succeeds() {
        let shared = Shared::default();
        let mut calls = 0;

        let value = with_retry(&shared, "Fail to submit", Status::Retry, || {
            calls += 1;
            if calls == 1 { Err(failure()) } else { Ok(calls) }
        });

        assert_eq!(value, Some(2));
    }

    #[test]
    fn test_gives_up_after_two_failures() {
        let shared = Shared::default();
        let mut calls = 0;

        let value: Option<()> = with_retry(&shared, "Fail to submit", Status::Retry, || {
            calls += 1;
            Err(failure())
        });

        assert!(value.is_none());
        assert_eq!(calls, 2);
        assert!(!shared.lock().discard_session);
    }

    #[test]
    fn test_clean_escalation_discards_session() {
        let shared = Shared::default();

        let value: Option<()> = with_retry(&shared, "Fail to stop", Status::Clean, || Err(failure()));

        assert!(value.is_none());
        assert!(shared.lock().discard_session);
    }
}
