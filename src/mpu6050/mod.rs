/// Register protocol for the InvenSense MPU6050 over the bit-banged two-wire bus
///
/// Write: START, address+W, register, value, STOP
/// Read: START, address+W, register, REPEATED START, address+R, value, NACK, STOP
///
/// Every byte the master sends is acknowledged by the slave; what happens
/// when it isn't is decided by `AckPolicy`.

pub mod registers;

use crate::bus::{
	Ack,
	Direction,
	SlaveAddress,
	TwoWire,
	TwoWireExt,
};
use crate::error::{
	BusError,
	NackStage,
};
use crate::wait::{
	WaitOutcome,
	WaitPolicy,
};

use self::registers::*;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AckPolicy {
	/// a missing acknowledge aborts the transaction with `BusError::Nack`
	Strict,
	/// log it and clock through the rest of the sequence anyway
	Ignore,
}

impl Default for AckPolicy {
	fn default() -> Self {
		AckPolicy::Strict
	}
}

/// One sample of all six axes, raw two's complement values
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Axes {
	pub accel: [i16; 3],
	pub gyro: [i16; 3],
}

impl Axes {
	/// acceleration in g, assuming the ±16 g range `init` configures
	pub fn accel_g(&self) -> [f32; 3] {
		let mut r = [0f32; 3];
		for (r, v) in r.iter_mut().zip(self.accel.iter()) {
			*r = f32::from(*v) / ACCEL_LSB_PER_G;
		}
		r
	}

	/// angular rate in °/s, assuming the ±2000 °/s range `init` configures
	pub fn gyro_dps(&self) -> [f32; 3] {
		let mut r = [0f32; 3];
		for (r, v) in r.iter_mut().zip(self.gyro.iter()) {
			*r = f32::from(*v) / GYRO_LSB_PER_DPS;
		}
		r
	}
}

fn combine(high: u8, low: u8) -> i16 {
	((high as u16) << 8 | low as u16) as i16
}

pub struct Mpu6050<H: TwoWire> {
	bus: H,
	address: SlaveAddress,
	ack_policy: AckPolicy,
	event_wait: WaitPolicy,
}

impl<H: TwoWire> Mpu6050<H> {
	pub fn new(bus: H) -> Self {
		Mpu6050 {
			bus,
			address: SlaveAddress::new(DEFAULT_ADDRESS).expect("default address is 7-bit"),
			ack_policy: AckPolicy::default(),
			event_wait: WaitPolicy::register_event(),
		}
	}

	pub fn with_address(mut self, address: SlaveAddress) -> Self {
		self.address = address;
		self
	}

	pub fn with_ack_policy(mut self, ack_policy: AckPolicy) -> Self {
		self.ack_policy = ack_policy;
		self
	}

	pub fn with_event_wait(mut self, event_wait: WaitPolicy) -> Self {
		self.event_wait = event_wait;
		self
	}

	pub fn address(&self) -> SlaveAddress {
		self.address
	}

	pub fn bus(&self) -> &H {
		&self.bus
	}

	pub fn bus_mut(&mut self) -> &mut H {
		&mut self.bus
	}

	pub fn into_inner(self) -> H {
		self.bus
	}

	fn check(address: SlaveAddress, policy: AckPolicy, ack: Ack, stage: NackStage) -> crate::AResult<()> {
		if ack.is_ack() {
			return Ok(());
		}
		match policy {
			AckPolicy::Strict => Err(BusError::Nack { stage }.into()),
			AckPolicy::Ignore => {
				warn!("MPU6050 {}: no acknowledge for {}, continuing", address, stage);
				Ok(())
			},
		}
	}

	/// release the lines and run the wake-up / range configuration
	pub fn init(&mut self) -> crate::AResult<()> {
		self.bus.idle();
		let address = self.address;
		with_context!(("MPU6050 {}: init", address), {
			for &(register, value) in INIT_SEQUENCE.iter() {
				self.write_register(register, value)?;
			}
			Ok(())
		})
	}

	pub fn write_register(&mut self, register: u8, value: u8) -> crate::AResult<()> {
		let (address, policy) = (self.address, self.ack_policy);
		let mut tx = self.bus.start_transaction();
		Self::check(address, policy, tx.send_address(address, Direction::Write), NackStage::AddressWrite)?;
		Self::check(address, policy, tx.send_byte(register), NackStage::Register)?;
		Self::check(address, policy, tx.send_byte(value), NackStage::Value)?;
		tx.stop();
		debug!("MPU6050 {}: write 0x{:02x} <- 0x{:02x}", address, register, value);
		Ok(())
	}

	pub fn read_register(&mut self, register: u8) -> crate::AResult<u8> {
		let mut value = [0u8];
		self.read_registers(register, &mut value)?;
		Ok(value[0])
	}

	/// burst read of consecutive registers in one transaction
	pub fn read_registers(&mut self, start: u8, target: &mut [u8]) -> crate::AResult<()> {
		if target.is_empty() {
			return Ok(());
		}
		let (address, policy) = (self.address, self.ack_policy);
		let mut tx = self.bus.start_transaction();
		Self::check(address, policy, tx.send_address(address, Direction::Write), NackStage::AddressWrite)?;
		Self::check(address, policy, tx.send_byte(start), NackStage::Register)?;
		tx.repeated_start();
		Self::check(address, policy, tx.send_address(address, Direction::Read), NackStage::AddressRead)?;
		tx.receive_into(target);
		tx.stop();
		debug!("MPU6050 {}: read 0x{:02x} -> {:02x?}", address, start, target);
		Ok(())
	}

	/// WHO_AM_I, 0x68 on a genuine part
	pub fn get_id(&mut self) -> crate::AResult<u8> {
		self.read_register(WHO_AM_I)
	}

	/// Twelve single register reads, high byte first per axis.
	///
	/// The pairs come from separate transactions, so a sample may tear if
	/// the sensor updates in between; use `read_axes_burst` to avoid that.
	pub fn read_axes(&mut self) -> crate::AResult<Axes> {
		let mut values = [0i16; 6];
		for (v, &(high, low)) in values.iter_mut().zip(AXIS_REGISTERS.iter()) {
			let h = self.read_register(high)?;
			let l = self.read_register(low)?;
			*v = combine(h, l);
		}
		Ok(Axes {
			accel: [values[0], values[1], values[2]],
			gyro: [values[3], values[4], values[5]],
		})
	}

	/// all six axes (and the temperature in between) in one transaction
	pub fn read_axes_burst(&mut self) -> crate::AResult<Axes> {
		let mut raw = [0u8; 14];
		self.read_registers(ACCEL_XOUT_H, &mut raw)?;
		let word = |i: usize| combine(raw[i], raw[i + 1]);
		Ok(Axes {
			accel: [word(0), word(2), word(4)],
			// 6..8 is TEMP_OUT
			gyro: [word(8), word(10), word(12)],
		})
	}

	/// Poll `check` within the event wait budget.
	pub fn wait_event<F>(&mut self, mut check: F) -> crate::AResult<WaitOutcome>
	where
		F: FnMut(&mut Self) -> crate::AResult<bool>,
	{
		let policy = self.event_wait;
		policy.try_poll(|| check(self))
	}

	/// wait for DATA_RDY in INT_STATUS; returns the number of polls that
	/// came back not ready
	pub fn wait_data_ready(&mut self) -> crate::AResult<u32> {
		let outcome = self.wait_event(|dev| {
			Ok(0 != dev.read_register(INT_STATUS)? & INT_STATUS_DATA_RDY)
		})?;
		debug!("MPU6050 {}: data ready wait: {:?}", self.address, outcome);
		Ok(outcome.into_result()?)
	}
}
