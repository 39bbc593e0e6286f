use std::thread;
use std::time::{
	Duration,
	Instant,
};

// standard mode I²C is 100 kHz; one transition every 10µs stays well below
pub const TWO_WIRE_SETTLE: Duration = Duration::from_micros(10);
pub const FOUR_WIRE_SETTLE: Duration = Duration::from_micros(1);

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Raw access to the clock and data line of a two-wire bus.
///
/// Lines are expected to behave open drain: writing `true` releases the
/// line, so `read_data` reports the wired AND of master and slave.
pub trait TwoWire {
	fn set_clock(&mut self, level: bool);
	fn set_data(&mut self, level: bool);
	fn read_data(&mut self) -> bool;

	// delay for (at least) one line transition
	fn delay(&mut self) {
		reliable_sleep(TWO_WIRE_SETTLE);
	}
}

/// Raw access to the lines of a four-wire bus; `set_select(false)` selects
/// the slave.
pub trait FourWire {
	fn set_select(&mut self, level: bool);
	fn set_clock(&mut self, level: bool);
	fn set_mosi(&mut self, level: bool);
	fn read_miso(&mut self) -> bool;

	// delay for (at least) one line transition
	fn delay(&mut self) {
		reliable_sleep(FOUR_WIRE_SETTLE);
	}
}

impl<'a, H: ?Sized + TwoWire> TwoWire for &'a mut H {
	fn set_clock(&mut self, level: bool) {
		H::set_clock(*self, level)
	}
	fn set_data(&mut self, level: bool) {
		H::set_data(*self, level)
	}
	fn read_data(&mut self) -> bool {
		H::read_data(*self)
	}
	fn delay(&mut self) {
		H::delay(*self)
	}
}

impl<'a, H: ?Sized + FourWire> FourWire for &'a mut H {
	fn set_select(&mut self, level: bool) {
		H::set_select(*self, level)
	}
	fn set_clock(&mut self, level: bool) {
		H::set_clock(*self, level)
	}
	fn set_mosi(&mut self, level: bool) {
		H::set_mosi(*self, level)
	}
	fn read_miso(&mut self) -> bool {
		H::read_miso(*self)
	}
	fn delay(&mut self) {
		H::delay(*self)
	}
}
