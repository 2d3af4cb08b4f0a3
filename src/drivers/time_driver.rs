//! `embassy-time` driver on top of `esp_timer`.
//!
//! `async_io_mini::Timer`, which paces the continuous sampler, sleeps
//! through `embassy-time`.  That crate resolves its driver at link time via
//! two unmangled functions, provided here.  Ticks are microseconds since
//! boot (the default 1 MHz tick rate).  Host builds enable `embassy-time`'s
//! `std` driver instead.

use core::task::Waker;
use core::time::Duration;

/// Wake threads only sleep and call `Waker::wake`.
const WAKE_STACK_BYTES: usize = 3 * 1024;

#[unsafe(no_mangle)]
pub fn _embassy_time_now() -> u64 {
    // SAFETY: esp_timer is running before `main`; the call has no preconditions.
    unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
}

/// Arrange for `waker` to fire once `_embassy_time_now() >= at`.
#[unsafe(no_mangle)]
pub fn _embassy_time_schedule_wake(at: u64, waker: &Waker) {
    let now = _embassy_time_now();
    if at <= now {
        waker.wake_by_ref();
        return;
    }

    let pending = waker.clone();
    let spawned = std::thread::Builder::new()
        .name("time-wake".into())
        .stack_size(WAKE_STACK_BYTES)
        .spawn(move || {
            std::thread::sleep(Duration::from_micros(at - now));
            pending.wake();
        });
    if let Err(e) = spawned {
        // Wake now; the timer re-arms on its next poll.
        log::warn!("time driver: wake thread spawn failed ({e})");
        waker.wake_by_ref();
    }
}
