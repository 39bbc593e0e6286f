use std::fmt;

use super::TwoWire;
use crate::error::BusError;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Write,
	Read,
}

/// 7-bit slave address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SlaveAddress(u8);

impl SlaveAddress {
	pub fn new(address: u8) -> Result<Self, BusError> {
		if address > 0x7f {
			return Err(BusError::InvalidSlaveAddress { address });
		}
		Ok(SlaveAddress(address))
	}

	pub fn get(self) -> u8 {
		self.0
	}

	// address in the upper 7 bits, lowest bit 1 for reading
	pub fn wire_byte(self, direction: Direction) -> u8 {
		let rw = match direction {
			Direction::Write => 0,
			Direction::Read => 1,
		};
		self.0 << 1 | rw
	}
}

impl fmt::Display for SlaveAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Ack {
	Ack,
	Nack,
}

impl Ack {
	pub fn is_ack(self) -> bool {
		Ack::Ack == self
	}

	// receiver pulls data low to acknowledge
	fn from_level(level: bool) -> Self {
		if level { Ack::Nack } else { Ack::Ack }
	}

	fn level(self) -> bool {
		Ack::Nack == self
	}
}

trait InternalTwoWire: TwoWire {
	fn w_scl(&mut self, level: bool) {
		self.set_clock(level);
		self.delay();
	}

	fn w_sda(&mut self, level: bool) {
		self.set_data(level);
		self.delay();
	}

	fn r_sda(&mut self) -> bool {
		let level = self.read_data();
		self.delay();
		level
	}

	// expects idle (or clock low after a previous byte); leaves clock low
	fn _start(&mut self) {
		self.w_sda(true);
		self.w_scl(true);
		self.w_sda(false);
		self.w_scl(false);
	}

	// leaves both lines released
	fn _stop(&mut self) {
		self.w_sda(false);
		self.w_scl(true);
		self.w_sda(true);
	}
}

impl<H: TwoWire + ?Sized> InternalTwoWire for H {
}

/// One bus transaction, from start condition to stop condition.
///
/// The stop condition is sent when the transaction is dropped, so a session
/// can't be left open. Repeated starts happen inside the same value, which
/// makes "no stop in between" hold by construction.
pub struct Transaction<'a, H: ?Sized + TwoWire + 'a> {
	bus: &'a mut H,
}

impl<'a, H: ?Sized + TwoWire> Transaction<'a, H> {
	/// shift out 8 bits MSB first, then clock the acknowledge bit in
	pub fn send_byte(&mut self, byte: u8) -> Ack {
		for bit in (0..8).rev() {
			self.bus.w_sda(0 != byte & (1 << bit));
			self.bus.w_scl(true);
			self.bus.w_scl(false);
		}
		self.receive_ack()
	}

	pub fn send_address(&mut self, address: SlaveAddress, direction: Direction) -> Ack {
		self.send_byte(address.wire_byte(direction))
	}

	fn receive_ack(&mut self) -> Ack {
		// release data so the slave can pull it down
		self.bus.w_sda(true);
		self.bus.w_scl(true);
		let level = self.bus.r_sda();
		self.bus.w_scl(false);
		Ack::from_level(level)
	}

	/// shift in 8 bits MSB first; the caller has to follow up with `send_ack`
	pub fn receive_byte(&mut self) -> u8 {
		let mut byte = 0u8;
		self.bus.w_sda(true);
		for bit in (0..8).rev() {
			self.bus.w_scl(true);
			if self.bus.r_sda() {
				byte |= 1 << bit;
			}
			self.bus.w_scl(false);
		}
		byte
	}

	/// `Ack::Nack` tells the slave no more bytes are wanted
	pub fn send_ack(&mut self, ack: Ack) {
		self.bus.w_sda(ack.level());
		self.bus.w_scl(true);
		self.bus.w_scl(false);
	}

	/// receive `target.len()` bytes, acknowledging all but the last one
	pub fn receive_into(&mut self, target: &mut [u8]) {
		let len = target.len();
		for (i, t) in target.iter_mut().enumerate() {
			*t = self.receive_byte();
			self.send_ack(if i + 1 == len { Ack::Nack } else { Ack::Ack });
		}
	}

	pub fn repeated_start(&mut self) {
		trace!("repeated start");
		self.bus._start();
	}

	/// end the transaction now (same as dropping it)
	pub fn stop(self) {
	}
}

impl<'a, H: ?Sized + TwoWire> Drop for Transaction<'a, H> {
	fn drop(&mut self) {
		trace!("stop");
		self.bus._stop();
	}
}

pub trait TwoWireExt: TwoWire {
	/// release both lines
	fn idle(&mut self) {
		self.set_data(true);
		self.set_clock(true);
		self.delay();
	}

	fn start_transaction(&mut self) -> Transaction<Self> {
		trace!("start");
		self._start();
		Transaction { bus: self }
	}
}

impl<H: TwoWire + ?Sized> TwoWireExt for H {
}

#[cfg(test)]
mod tests {
	use super::*;

	// samples data on every rising clock edge and replays it nine clocks
	// (one byte plus acknowledge) later
	#[derive(Default)]
	struct DelayLine {
		clock: bool,
		data: bool,
		samples: Vec<bool>,
		edges: Vec<(bool, bool)>,
	}

	impl TwoWire for DelayLine {
		fn set_clock(&mut self, level: bool) {
			if level && !self.clock {
				self.samples.push(self.data);
			}
			self.clock = level;
			self.edges.push((self.clock, self.data));
		}
		fn set_data(&mut self, level: bool) {
			self.data = level;
			self.edges.push((self.clock, self.data));
		}
		fn read_data(&mut self) -> bool {
			let len = self.samples.len();
			if len < 10 { true } else { self.samples[len - 10] }
		}
		fn delay(&mut self) {
		}
	}

	#[test]
	fn loopback_reproduces_every_byte() {
		for b in 0..=255u8 {
			let mut line = DelayLine::default();
			let mut tx = line.start_transaction();
			// nothing drives the acknowledge slot yet
			assert_eq!(tx.send_byte(b), Ack::Nack);
			assert_eq!(tx.receive_byte(), b);
		}
	}

	#[test]
	fn msb_goes_out_first() {
		let mut line = DelayLine::default();
		line.start_transaction().send_byte(0b1000_0001);
		// start raises the clock once while data is still high, then come
		// 8 data bits and the released acknowledge slot
		assert_eq!(&line.samples[1..10], &[true, false, false, false, false, false, false, true, true]);
	}

	#[test]
	fn start_stop_returns_to_idle() {
		let mut line = DelayLine::default();
		line.idle();
		drop(line.start_transaction());
		assert!(line.clock);
		assert!(line.data);
	}

	#[test]
	fn start_and_stop_conditions() {
		let mut line = DelayLine::default();
		line.idle();
		line.edges.clear();
		line.start_transaction().stop();
		assert_eq!(line.edges, vec![
			// start: SDA falls while SCL is high
			(true, true), (true, true), (true, false), (false, false),
			// stop: SDA rises while SCL is high
			(false, false), (true, false), (true, true),
		]);
	}

	#[test]
	fn receive_into_nacks_last_byte() {
		let mut line = DelayLine::default();
		{
			let mut tx = line.start_transaction();
			let mut buf = [0u8; 2];
			tx.receive_into(&mut buf);
			// pulled up line reads as ones
			assert_eq!(buf, [0xff, 0xff]);
		}
		// clock edge #0 is from start, then 8 data + ack per byte
		assert_eq!(line.samples[9], false);
		assert_eq!(line.samples[18], true);
	}

	#[test]
	fn slave_address_wire_format() {
		let a = SlaveAddress::new(0x68).unwrap();
		assert_eq!(a.wire_byte(Direction::Write), 0xd0);
		assert_eq!(a.wire_byte(Direction::Read), 0xd1);
		assert_eq!(SlaveAddress::new(0x80), Err(BusError::InvalidSlaveAddress { address: 0x80 }));
	}
}
