use crate::session::SessionShared;

/// Claim or verify ownership of the driving thread.
///
/// The first thread to drive a session becomes its owner; any later attempt
/// to drive it from another thread is a bug in the caller.
#[cfg(not(feature = "no_thread_checks"))]
#[inline(always)]
pub(crate) fn do_thread_check(shared: &SessionShared) {
    #[inline(never)]
    #[cold]
    fn do_thread_check_fail() {
        panic!("a session must not be driven on a different thread than the one that first drove it");
    }

    if !shared.claim_owner() {
        do_thread_check_fail();
    }
}

#[cfg(feature = "no_thread_checks")]
#[inline(always)]
pub(crate) fn do_thread_check(shared: &SessionShared) {
    // Ownership must still be claimed: the run-now fast path relies on it.
    let _ = shared.claim_owner();
}
