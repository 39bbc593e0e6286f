use std::time::Duration;

use crate::bus::reliable_sleep;
use crate::error::BusError;

/// Attempt budget for polling a device condition.
///
/// The counter strictly decreases with every failed check; when it reaches
/// zero the wait ends as `TimedOut` instead of spinning forever.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WaitPolicy {
	pub max_attempts: u32,
	/// pause between two checks; zero means the check itself paces the loop
	pub interval: Duration,
}

impl WaitPolicy {
	pub const fn attempts(max_attempts: u32) -> Self {
		WaitPolicy {
			max_attempts,
			interval: Duration::from_secs(0),
		}
	}

	/// budget for flash program/erase busy polling
	pub const fn storage() -> Self {
		Self::attempts(100_000)
	}

	/// budget for waiting on a sensor event flag
	pub const fn register_event() -> Self {
		Self::attempts(10_000)
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// Poll `ready` until it returns true or the budget is exhausted.
	///
	/// A budget of zero still checks once.
	pub fn poll<F>(&self, ready: F) -> WaitOutcome
	where
		F: FnMut() -> bool,
	{
		self.poll_with(ready, reliable_sleep)
	}

	/// Like `poll`, but the pause between checks goes through `sleep`.
	pub fn poll_with<F, S>(&self, mut ready: F, sleep: S) -> WaitOutcome
	where
		F: FnMut() -> bool,
		S: FnMut(Duration),
	{
		match self.try_poll_with(|| Ok(ready()), sleep) {
			Ok(outcome) => outcome,
			Err(_) => unreachable!(),
		}
	}

	/// Like `poll`, but the check itself may fail; errors abort the wait.
	pub fn try_poll<F>(&self, ready: F) -> crate::AResult<WaitOutcome>
	where
		F: FnMut() -> crate::AResult<bool>,
	{
		self.try_poll_with(ready, reliable_sleep)
	}

	/// `try_poll` with the pause between checks going through `sleep`; it
	/// is called once per failed check except the last.
	pub fn try_poll_with<F, S>(&self, mut ready: F, mut sleep: S) -> crate::AResult<WaitOutcome>
	where
		F: FnMut() -> crate::AResult<bool>,
		S: FnMut(Duration),
	{
		let budget = self.max_attempts.max(1);
		let mut remaining = budget;
		loop {
			if ready()? {
				return Ok(WaitOutcome::Ready { polls: budget - remaining });
			}
			remaining -= 1;
			if 0 == remaining {
				return Ok(WaitOutcome::TimedOut { attempts: budget });
			}
			if self.interval > Duration::from_secs(0) {
				sleep(self.interval);
			}
		}
	}
}

impl Default for WaitPolicy {
	fn default() -> Self {
		Self::storage()
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WaitOutcome {
	/// condition held; `polls` failed checks came before it
	Ready { polls: u32 },
	/// every one of `attempts` checks failed
	TimedOut { attempts: u32 },
}

impl WaitOutcome {
	pub fn is_ready(&self) -> bool {
		match self {
			WaitOutcome::Ready { .. } => true,
			WaitOutcome::TimedOut { .. } => false,
		}
	}

	/// number of failed checks before success
	pub fn into_result(self) -> Result<u32, BusError> {
		match self {
			WaitOutcome::Ready { polls } => Ok(polls),
			WaitOutcome::TimedOut { attempts } => Err(BusError::Timeout { attempts }),
		}
	}
}
