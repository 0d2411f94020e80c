#[cold]
fn cold_path() {
    std::hint::black_box(())
}

/// Hint to the compiler that the given condition is almost always true.
#[inline]
pub fn likely(b: bool) -> bool {
    if !b {
        cold_path();
    }
    b
}

/// Hint to the compiler that the given condition is almost always false.
#[inline]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
    }
    b
}
