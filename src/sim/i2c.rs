use crate::bus::TwoWire;

/// Register based slave as seen behind a two-wire bus.
///
/// The first byte written after addressing sets the register pointer; later
/// writes and all reads auto-increment it.
pub trait RegisterDevice {
	fn address(&self) -> u8;
	fn read(&mut self, register: u8) -> u8;
	fn write(&mut self, register: u8, value: u8);
}

/// Framing as observed by the slave.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BusEvent {
	Start,
	RepeatedStart,
	Stop,
	Address { address: u8, read: bool, acked: bool },
	Written(u8),
	Read(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
	Idle,
	Address,
	Receive,
	Transmit,
	// not addressed or read finished; waiting for start/stop
	Ignore,
}

/// Two-wire lines with a simulated slave attached.
///
/// The slave reacts to every line transition the master makes; data is the
/// wired AND of what master and slave drive.
pub struct I2cBus<D> {
	device: D,
	scl: bool,
	master_sda: bool,
	slave_sda: bool,
	phase: Phase,
	// rising clock edges in the current 9-clock frame
	clock: u8,
	shift: u8,
	read_request: bool,
	addressed: bool,
	pointer_pending: bool,
	pointer: u8,
	transmit: u8,
	master_acked: bool,
	in_transaction: bool,
	// bytes the master sent since the last start (repeated starts included)
	master_bytes: usize,
	nack_at: Option<usize>,
	events: Vec<BusEvent>,
}

impl<D: RegisterDevice> I2cBus<D> {
	pub fn new(device: D) -> Self {
		I2cBus {
			device,
			scl: true,
			master_sda: true,
			slave_sda: true,
			phase: Phase::Idle,
			clock: 0,
			shift: 0,
			read_request: false,
			addressed: false,
			pointer_pending: false,
			pointer: 0,
			transmit: 0xff,
			master_acked: false,
			in_transaction: false,
			master_bytes: 0,
			nack_at: None,
			events: Vec::new(),
		}
	}

	/// Refuse the acknowledge for the `index`-th byte the master sends in a
	/// transaction (0 is the first address byte; the address after a
	/// repeated start keeps counting). The slave then ignores the rest of
	/// the transaction.
	pub fn with_nack_at(mut self, index: usize) -> Self {
		self.nack_at = Some(index);
		self
	}

	pub fn device(&self) -> &D {
		&self.device
	}

	pub fn device_mut(&mut self) -> &mut D {
		&mut self.device
	}

	pub fn events(&self) -> &[BusEvent] {
		&self.events
	}

	pub fn clear_events(&mut self) {
		self.events.clear();
	}

	pub fn count(&self, event: BusEvent) -> usize {
		self.events.iter().filter(|e| **e == event).count()
	}

	/// both lines released (idle)
	pub fn is_idle(&self) -> bool {
		self.scl && self.sda()
	}

	fn sda(&self) -> bool {
		self.master_sda && self.slave_sda
	}

	fn update(&mut self, scl_before: bool, sda_before: bool) {
		let scl = self.scl;
		let sda = self.sda();
		if scl_before && scl {
			if sda_before && !sda {
				self.on_start();
			} else if !sda_before && sda {
				self.on_stop();
			}
		} else if !scl_before && scl {
			self.on_rising(sda);
		} else if scl_before && !scl {
			self.on_falling();
		}
	}

	fn on_start(&mut self) {
		if !self.in_transaction {
			self.master_bytes = 0;
		}
		self.events.push(if self.in_transaction { BusEvent::RepeatedStart } else { BusEvent::Start });
		self.in_transaction = true;
		self.phase = Phase::Address;
		self.clock = 0;
		self.shift = 0;
		self.slave_sda = true;
	}

	fn on_stop(&mut self) {
		if self.in_transaction {
			self.events.push(BusEvent::Stop);
		}
		self.in_transaction = false;
		self.phase = Phase::Idle;
		self.slave_sda = true;
	}

	fn on_rising(&mut self, sda: bool) {
		match self.phase {
			Phase::Address | Phase::Receive => {
				self.clock += 1;
				if self.clock <= 8 {
					self.shift = self.shift << 1 | sda as u8;
				}
			},
			Phase::Transmit => {
				self.clock += 1;
				if 9 == self.clock {
					self.master_acked = !sda;
				}
			},
			Phase::Idle | Phase::Ignore => (),
		}
	}

	fn on_falling(&mut self) {
		match (self.phase, self.clock) {
			(Phase::Address, 8) => {
				let address = self.shift >> 1;
				self.read_request = 0 != self.shift & 1;
				self.addressed = address == self.device.address() && !self.refuse();
				self.events.push(BusEvent::Address {
					address,
					read: self.read_request,
					acked: self.addressed,
				});
				self.slave_sda = !self.addressed;
			},
			(Phase::Address, 9) => {
				self.next_frame();
				if !self.addressed {
					self.phase = Phase::Ignore;
				} else if self.read_request {
					self.phase = Phase::Transmit;
					self.load_transmit();
				} else {
					self.phase = Phase::Receive;
					self.pointer_pending = true;
				}
			},
			(Phase::Receive, 8) => {
				let value = self.shift;
				if self.refuse() {
					// data stays released for the ninth clock
					self.phase = Phase::Ignore;
					return;
				}
				if self.pointer_pending {
					self.pointer = value;
					self.pointer_pending = false;
				} else {
					self.device.write(self.pointer, value);
					self.pointer = self.pointer.wrapping_add(1);
				}
				self.events.push(BusEvent::Written(value));
				self.slave_sda = false;
			},
			(Phase::Receive, 9) => {
				self.next_frame();
			},
			(Phase::Transmit, 1..=7) => {
				self.slave_sda = 0 != self.transmit & (0x80 >> self.clock);
			},
			(Phase::Transmit, 8) => {
				// master acknowledges
				self.slave_sda = true;
			},
			(Phase::Transmit, 9) => {
				self.clock = 0;
				if self.master_acked {
					self.load_transmit();
				} else {
					self.phase = Phase::Ignore;
				}
			},
			_ => (),
		}
	}

	fn refuse(&mut self) -> bool {
		let index = self.master_bytes;
		self.master_bytes += 1;
		Some(index) == self.nack_at
	}

	fn next_frame(&mut self) {
		self.slave_sda = true;
		self.clock = 0;
		self.shift = 0;
	}

	// put the MSB on the line while the clock is low
	fn load_transmit(&mut self) {
		self.transmit = self.device.read(self.pointer);
		self.pointer = self.pointer.wrapping_add(1);
		self.events.push(BusEvent::Read(self.transmit));
		self.slave_sda = 0 != self.transmit & 0x80;
	}
}

impl<D: RegisterDevice> TwoWire for I2cBus<D> {
	fn set_clock(&mut self, level: bool) {
		let (scl, sda) = (self.scl, self.sda());
		self.scl = level;
		self.update(scl, sda);
	}

	fn set_data(&mut self, level: bool) {
		let (scl, sda) = (self.scl, self.sda());
		self.master_sda = level;
		self.update(scl, sda);
	}

	fn read_data(&mut self) -> bool {
		self.sda()
	}

	fn delay(&mut self) {
	}
}

const WHO_AM_I: u8 = 0x75;
const INT_STATUS: u8 = 0x3a;

/// MPU6050 register file: WHO_AM_I reads 0x68, every other register echoes
/// the last write.
///
/// INT_STATUS raises DATA_RDY after `data_ready_after` reads and clears on
/// read.
#[derive(Clone, Debug)]
pub struct Mpu6050Model {
	address: u8,
	registers: [u8; 128],
	data_ready_after: u32,
	status_reads: u32,
	pub writes: Vec<(u8, u8)>,
}

impl Mpu6050Model {
	pub fn new() -> Self {
		let mut registers = [0u8; 128];
		registers[WHO_AM_I as usize] = 0x68;
		Mpu6050Model {
			address: 0x68,
			registers,
			data_ready_after: 0,
			status_reads: 0,
			writes: Vec::new(),
		}
	}

	/// listen on another slave address (AD0 pin high: 0x69)
	pub fn with_address(mut self, address: u8) -> Self {
		self.address = address;
		self
	}

	pub fn with_data_ready_after(mut self, reads: u32) -> Self {
		self.data_ready_after = reads;
		self
	}

	pub fn register(&self, register: u8) -> u8 {
		self.registers[register as usize & 0x7f]
	}

	pub fn set_register(&mut self, register: u8, value: u8) {
		self.registers[register as usize & 0x7f] = value;
	}

	/// store samples big endian starting at ACCEL_XOUT_H / GYRO_XOUT_H
	pub fn set_axes(&mut self, accel: [i16; 3], gyro: [i16; 3]) {
		for (i, v) in accel.iter().enumerate() {
			self.set_register(0x3b + 2 * i as u8, (*v >> 8) as u8);
			self.set_register(0x3c + 2 * i as u8, *v as u8);
		}
		for (i, v) in gyro.iter().enumerate() {
			self.set_register(0x43 + 2 * i as u8, (*v >> 8) as u8);
			self.set_register(0x44 + 2 * i as u8, *v as u8);
		}
	}
}

impl Default for Mpu6050Model {
	fn default() -> Self {
		Self::new()
	}
}

impl RegisterDevice for Mpu6050Model {
	fn address(&self) -> u8 {
		self.address
	}

	fn read(&mut self, register: u8) -> u8 {
		if INT_STATUS == register {
			self.status_reads += 1;
			if self.status_reads > self.data_ready_after {
				self.status_reads = 0;
				return 0x01;
			}
			return 0x00;
		}
		self.register(register)
	}

	fn write(&mut self, register: u8, value: u8) {
		self.writes.push((register, value));
		if WHO_AM_I != register {
			self.set_register(register, value);
		}
	}
}
