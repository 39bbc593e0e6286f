use super::FourWire;

/// sent while only interested in the received byte
pub const DUMMY_BYTE: u8 = 0xff;

trait InternalFourWire: FourWire {
	fn w_cs(&mut self, level: bool) {
		self.set_select(level);
		self.delay();
	}

	fn w_sck(&mut self, level: bool) {
		self.set_clock(level);
		self.delay();
	}

	fn w_mosi(&mut self, level: bool) {
		self.set_mosi(level);
		self.delay();
	}

	fn r_miso(&mut self) -> bool {
		let level = self.read_miso();
		self.delay();
		level
	}
}

impl<H: FourWire + ?Sized> InternalFourWire for H {
}

/// Slave selected (CS low) until dropped.
pub struct Selection<'a, H: ?Sized + FourWire + 'a> {
	bus: &'a mut H,
}

impl<'a, H: ?Sized + FourWire> Selection<'a, H> {
	/// exchange one byte, MSB first
	pub fn transfer(&mut self, byte: u8) -> u8 {
		let mut received = 0u8;
		for bit in (0..8).rev() {
			self.bus.w_mosi(0 != byte & (1 << bit));
			// slave samples MOSI on the rising edge and has MISO ready
			self.bus.w_sck(true);
			if self.bus.r_miso() {
				received |= 1 << bit;
			}
			self.bus.w_sck(false);
		}
		received
	}

	pub fn write(&mut self, data: &[u8]) {
		for b in data {
			self.transfer(*b);
		}
	}

	pub fn read(&mut self, target: &mut [u8]) {
		for t in target.iter_mut() {
			*t = self.transfer(DUMMY_BYTE);
		}
	}

	/// deselect now (same as dropping)
	pub fn release(self) {
	}
}

impl<'a, H: ?Sized + FourWire> Drop for Selection<'a, H> {
	fn drop(&mut self) {
		self.bus.w_cs(true);
		trace!("deselect");
	}
}

pub trait FourWireExt: FourWire {
	/// deselected, clock low
	fn idle(&mut self) {
		self.w_cs(true);
		self.w_sck(false);
	}

	fn select(&mut self) -> Selection<Self> {
		trace!("select");
		self.w_cs(false);
		Selection { bus: self }
	}
}

impl<H: FourWire + ?Sized> FourWireExt for H {
}

#[cfg(test)]
mod tests {
	use super::*;

	// MISO mirrors MOSI as sampled on the last rising edge
	#[derive(Default)]
	struct Wired {
		select: bool,
		clock: bool,
		mosi: bool,
		latched: bool,
		rising_edges: usize,
	}

	impl FourWire for Wired {
		fn set_select(&mut self, level: bool) {
			self.select = level;
		}
		fn set_clock(&mut self, level: bool) {
			if level && !self.clock {
				self.latched = self.mosi;
				self.rising_edges += 1;
			}
			self.clock = level;
		}
		fn set_mosi(&mut self, level: bool) {
			self.mosi = level;
		}
		fn read_miso(&mut self) -> bool {
			self.latched
		}
		fn delay(&mut self) {
		}
	}

	#[test]
	fn transfer_exchanges_msb_first() {
		let mut wired = Wired::default();
		wired.idle();
		{
			let mut sel = wired.select();
			for b in &[0x00u8, 0x5a, 0xa5, 0xff, 0x01, 0x80] {
				assert_eq!(sel.transfer(*b), *b);
			}
		}
		assert_eq!(wired.rising_edges, 6 * 8);
		assert!(wired.select);
		assert!(!wired.clock);
	}

	#[test]
	fn select_drives_cs_low() {
		let mut wired = Wired::default();
		wired.idle();
		assert!(wired.select);
		let sel = wired.select();
		assert!(!sel.bus.select);
		sel.release();
		assert!(wired.select);
	}

	#[test]
	fn read_sends_dummy_bytes() {
		let mut wired = Wired::default();
		let mut buf = [0u8; 3];
		wired.select().read(&mut buf);
		assert_eq!(buf, [DUMMY_BYTE; 3]);
	}
}
