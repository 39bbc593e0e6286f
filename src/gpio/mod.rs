/// Bus lines on Linux GPIOs
///
/// Slow (every transition is a syscall) but good enough for a sensor or a
/// flash chip that don't care about a minimum clock rate.

mod sysfs;

use std::path::Path;
use std::time::Duration;

use crate::bus::{
	FOUR_WIRE_SETTLE,
	FourWire,
	TWO_WIRE_SETTLE,
	TwoWire,
	reliable_sleep,
};

pub use self::sysfs::SysfsPin;

/// clock and data as emulated open drain lines; needs external pull-ups
pub struct TwoWirePins {
	scl: SysfsPin,
	sda: SysfsPin,
	settle: Option<Duration>,
}

impl TwoWirePins {
	pub fn open(scl: u32, sda: u32) -> crate::AResult<Self> {
		Self::from_pins(SysfsPin::open(scl)?, SysfsPin::open(sda)?)
	}

	pub fn open_at(root: &Path, scl: u32, sda: u32) -> crate::AResult<Self> {
		Self::from_pins(SysfsPin::open_at(root, scl)?, SysfsPin::open_at(root, sda)?)
	}

	fn from_pins(scl: SysfsPin, sda: SysfsPin) -> crate::AResult<Self> {
		let mut pins = TwoWirePins {
			scl,
			sda,
			settle: None,
		};
		let (scl, sda) = (pins.scl.number(), pins.sda.number());
		with_context!(("two-wire bus on GPIO {} / {}", scl, sda), {
			pins.sda.try_set_open_drain(true)?;
			pins.scl.try_set_open_drain(true)?;
			Ok(())
		})?;
		Ok(pins)
	}

	/// replace the default settle delay after each transition
	pub fn with_settle(mut self, settle: Duration) -> Self {
		self.settle = Some(settle);
		self
	}
}

impl TwoWire for TwoWirePins {
	fn set_clock(&mut self, level: bool) {
		self.scl.set_open_drain(level);
	}

	fn set_data(&mut self, level: bool) {
		self.sda.set_open_drain(level);
	}

	fn read_data(&mut self) -> bool {
		self.sda.read()
	}

	fn delay(&mut self) {
		reliable_sleep(self.settle.unwrap_or(TWO_WIRE_SETTLE));
	}
}

/// chip select, clock and MOSI push-pull, MISO input
pub struct FourWirePins {
	cs: SysfsPin,
	sck: SysfsPin,
	mosi: SysfsPin,
	miso: SysfsPin,
	settle: Option<Duration>,
}

impl FourWirePins {
	pub fn open(cs: u32, sck: u32, mosi: u32, miso: u32) -> crate::AResult<Self> {
		Self::from_pins(
			SysfsPin::open(cs)?,
			SysfsPin::open(sck)?,
			SysfsPin::open(mosi)?,
			SysfsPin::open(miso)?,
		)
	}

	pub fn open_at(root: &Path, cs: u32, sck: u32, mosi: u32, miso: u32) -> crate::AResult<Self> {
		Self::from_pins(
			SysfsPin::open_at(root, cs)?,
			SysfsPin::open_at(root, sck)?,
			SysfsPin::open_at(root, mosi)?,
			SysfsPin::open_at(root, miso)?,
		)
	}

	fn from_pins(cs: SysfsPin, sck: SysfsPin, mosi: SysfsPin, miso: SysfsPin) -> crate::AResult<Self> {
		let mut pins = FourWirePins {
			cs,
			sck,
			mosi,
			miso,
			settle: None,
		};
		let cs = pins.cs.number();
		with_context!(("four-wire bus with CS on GPIO {}", cs), {
			pins.cs.try_set_output(true)?;
			pins.sck.try_set_output(false)?;
			pins.mosi.try_set_output(false)?;
			pins.miso.try_set_input()?;
			Ok(())
		})?;
		Ok(pins)
	}

	pub fn with_settle(mut self, settle: Duration) -> Self {
		self.settle = Some(settle);
		self
	}
}

impl FourWire for FourWirePins {
	fn set_select(&mut self, level: bool) {
		self.cs.set_output(level);
	}

	fn set_clock(&mut self, level: bool) {
		self.sck.set_output(level);
	}

	fn set_mosi(&mut self, level: bool) {
		self.mosi.set_output(level);
	}

	fn read_miso(&mut self) -> bool {
		self.miso.read()
	}

	fn delay(&mut self) {
		reliable_sleep(self.settle.unwrap_or(FOUR_WIRE_SETTLE));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::sysfs::tests::FakeRoot;

	#[test]
	fn two_wire_setup_releases_both_lines() {
		let root = FakeRoot::new("two-wire");
		let scl = root.add_line(10);
		let sda = root.add_line(11);
		let mut pins = TwoWirePins::open_at(&root.0, 10, 11).unwrap().with_settle(Duration::from_secs(0));
		assert!(std::fs::read(scl.join("direction")).unwrap().starts_with(b"in"));
		assert!(std::fs::read(sda.join("direction")).unwrap().starts_with(b"in"));
		assert!(pins.read_data());
	}

	#[test]
	fn refused_line_fails_setup_instead_of_panicking() {
		let root = FakeRoot::new("two-wire-refused");
		root.add_line(12);
		if !root.add_broken_line(13) {
			return;
		}
		let err = TwoWirePins::open_at(&root.0, 12, 13).err().unwrap();
		assert!(format!("{}", err).starts_with("two-wire bus on GPIO 12 / 13"));

		root.add_line(14);
		root.add_line(15);
		root.add_line(16);
		let err = FourWirePins::open_at(&root.0, 14, 15, 16, 13).err().unwrap();
		assert!(format!("{}", err).starts_with("four-wire bus with CS on GPIO 14"));
	}
}
