use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::{Duration, Instant},
};

use uuid::Uuid;

use sift_domain::Preference;

/// Request-scoped, read-only view of the deadline. Every stage asks it how much time is left
/// instead of carrying its own budget.
#[derive(Debug)]
pub struct PipelineContext {
	request_id: Uuid,
	started: Instant,
	deadline: Instant,
	preference: Preference,
	current_year: i32,
	cancelled: AtomicBool,
}
impl PipelineContext {
	pub fn new(preference: Preference, budget: Duration) -> Self {
		let started = Instant::now();

		Self {
			request_id: Uuid::new_v4(),
			started,
			deadline: started + budget,
			preference,
			current_year: time::OffsetDateTime::now_utc().year(),
			cancelled: AtomicBool::new(false),
		}
	}

	/// Pins the calendar year used by recency and citation-velocity scoring.
	pub fn with_current_year(mut self, year: i32) -> Self {
		self.current_year = year;

		self
	}

	pub fn request_id(&self) -> Uuid {
		self.request_id
	}

	pub fn preference(&self) -> Preference {
		self.preference
	}

	pub fn current_year(&self) -> i32 {
		self.current_year
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	pub fn budget(&self) -> Duration {
		self.deadline.saturating_duration_since(self.started)
	}

	pub fn remaining(&self) -> Duration {
		if self.is_cancelled() {
			return Duration::ZERO;
		}

		self.deadline.saturating_duration_since(Instant::now())
	}

	pub fn remaining_ms(&self) -> u64 {
		self.remaining().as_millis() as u64
	}

	pub fn is_expired(&self) -> bool {
		self.remaining().is_zero()
	}

	/// Time left before `until`, never beyond the request deadline.
	pub fn remaining_until(&self, until: Instant) -> Duration {
		until.saturating_duration_since(Instant::now()).min(self.remaining())
	}

	/// An instant `fraction` of the remaining time from now.
	pub fn sub_deadline(&self, fraction: f32) -> Instant {
		Instant::now() + self.remaining().mul_f32(fraction.clamp(0.0, 1.0))
	}

	/// `ceiling` clamped to what is left after keeping `reserve` in hand.
	pub fn call_budget(&self, ceiling: Duration, reserve: Duration) -> Duration {
		ceiling.min(self.remaining().saturating_sub(reserve))
	}

	/// Makes every later `remaining` call report zero.
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}
}
