/// Block storage protocol for Winbond W25Q64 serial NOR flash
///
/// Every command is one chip select phase: opcode, optionally a 24-bit
/// address (high byte first), then data in either direction.
///
/// Program and erase need a WRITE ENABLE right before them and leave the
/// chip BUSY (status register bit 0) until the operation finished; the only
/// command the chip accepts meanwhile is reading the status register.
///
/// Program can only clear bits; only erase sets them back to 1, a whole
/// 4 KiB sector at a time.

use crate::bus::{
	DUMMY_BYTE,
	FourWire,
	FourWireExt,
	Selection,
};
use crate::error::BusError;
use crate::wait::{
	WaitOutcome,
	WaitPolicy,
};

#[allow(dead_code)]
mod consts {
	pub const WRITE_ENABLE: u8 = 0x06;
	pub const WRITE_DISABLE: u8 = 0x04;
	pub const READ_STATUS_REGISTER_1: u8 = 0x05;
	pub const READ_DATA: u8 = 0x03;
	pub const PAGE_PROGRAM: u8 = 0x02;
	pub const SECTOR_ERASE_4KB: u8 = 0x20;
	pub const JEDEC_ID: u8 = 0x9f;

	pub const STATUS_BUSY: u8 = 0x01;
	pub const STATUS_WEL: u8 = 0x02;

	pub const PAGE_SIZE: u32 = 256;
	pub const SECTOR_SIZE: u32 = 4096;
	// 64 Mbit
	pub const CAPACITY: u32 = 8 << 20;

	pub const MANUFACTURER_WINBOND: u8 = 0xef;
}

pub use self::consts::{
	CAPACITY,
	PAGE_SIZE,
	SECTOR_SIZE,
};

use self::consts::*;

/// What program / erase do when the busy flag doesn't clear in time
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TimeoutPolicy {
	/// fail with `BusError::Timeout`
	Report,
	/// log it and return success; the caller has to verify the content
	Proceed,
}

impl Default for TimeoutPolicy {
	fn default() -> Self {
		TimeoutPolicy::Report
	}
}

fn send_command<H: ?Sized + FourWire>(sel: &mut Selection<H>, opcode: u8, address: u32) {
	sel.transfer(opcode);
	sel.transfer((address >> 16) as u8);
	sel.transfer((address >> 8) as u8);
	sel.transfer(address as u8);
}

pub struct W25q64<H: FourWire> {
	bus: H,
	capacity: u32,
	busy_wait: WaitPolicy,
	timeout_policy: TimeoutPolicy,
}

impl<H: FourWire> W25q64<H> {
	pub fn new(bus: H) -> Self {
		W25q64 {
			bus,
			capacity: CAPACITY,
			busy_wait: WaitPolicy::storage(),
			timeout_policy: TimeoutPolicy::default(),
		}
	}

	/// other members of the family only differ in size (at most 16 MiB with
	/// 24-bit addresses)
	pub fn with_capacity(mut self, capacity: u32) -> Self {
		assert!(capacity <= 1 << 24);
		self.capacity = capacity;
		self
	}

	pub fn with_busy_wait(mut self, busy_wait: WaitPolicy) -> Self {
		self.busy_wait = busy_wait;
		self
	}

	pub fn with_timeout_policy(mut self, timeout_policy: TimeoutPolicy) -> Self {
		self.timeout_policy = timeout_policy;
		self
	}

	pub fn capacity(&self) -> u32 {
		self.capacity
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

	fn check_range(&self, address: u32, len: usize) -> Result<(), BusError> {
		if address >= self.capacity {
			return Err(BusError::AddressOutOfRange { address });
		}
		if len as u64 > (self.capacity - address) as u64 {
			let end = (address as u64 + len as u64 - 1).min(u32::max_value() as u64) as u32;
			return Err(BusError::AddressOutOfRange { address: end });
		}
		Ok(())
	}

	/// deselect and drop the clock
	pub fn init(&mut self) {
		self.bus.idle();
	}

	/// (manufacturer, memory type << 8 | capacity); (0xEF, 0x4017) for a W25Q64
	pub fn read_id(&mut self) -> (u8, u16) {
		let mut id = [0u8; 3];
		{
			let mut sel = self.bus.select();
			sel.transfer(JEDEC_ID);
			sel.read(&mut id);
		}
		let device = (id[1] as u16) << 8 | id[2] as u16;
		debug!("W25Q64: JEDEC id {:02x} {:04x}", id[0], device);
		(id[0], device)
	}

	pub fn write_enable(&mut self) {
		self.bus.select().transfer(WRITE_ENABLE);
	}

	pub fn write_disable(&mut self) {
		self.bus.select().transfer(WRITE_DISABLE);
	}

	pub fn read_status(&mut self) -> u8 {
		let mut sel = self.bus.select();
		sel.transfer(READ_STATUS_REGISTER_1);
		sel.transfer(DUMMY_BYTE)
	}

	/// Poll the busy flag within one status read command.
	///
	/// Chip select is released however the wait ended; a timeout is only
	/// reported in the returned outcome.
	pub fn wait_busy(&mut self) -> WaitOutcome {
		let policy = self.busy_wait;
		let outcome = {
			let mut sel = self.bus.select();
			sel.transfer(READ_STATUS_REGISTER_1);
			policy.poll(|| 0 == sel.transfer(DUMMY_BYTE) & STATUS_BUSY)
		};
		debug!("W25Q64: busy wait: {:?}", outcome);
		outcome
	}

	fn finish_busy(&mut self, operation: &str, address: u32) -> crate::AResult<()> {
		match (self.wait_busy(), self.timeout_policy) {
			(WaitOutcome::Ready { .. }, _) => Ok(()),
			(WaitOutcome::TimedOut { attempts }, TimeoutPolicy::Report) => {
				Err(BusError::Timeout { attempts }.into())
			},
			(WaitOutcome::TimedOut { attempts }, TimeoutPolicy::Proceed) => {
				warn!("W25Q64: {} at 0x{:06x} still busy after {} polls, continuing", operation, address, attempts);
				Ok(())
			},
		}
	}

	/// Program up to one page; must not cross a page boundary.
	///
	/// Bits can only be cleared, erase the sector first.
	pub fn page_program(&mut self, address: u32, data: &[u8]) -> crate::AResult<()> {
		if data.is_empty() {
			return Ok(());
		}
		self.check_range(address, data.len())?;
		if data.len() > PAGE_SIZE as usize || address % PAGE_SIZE + data.len() as u32 > PAGE_SIZE {
			return Err(BusError::PageOverflow { address, len: data.len() }.into());
		}

		self.write_enable();
		{
			let mut sel = self.bus.select();
			send_command(&mut sel, PAGE_PROGRAM, address);
			sel.write(data);
		}
		debug!("W25Q64: program {} bytes at 0x{:06x}", data.len(), address);
		self.finish_busy("page program", address)
	}

	/// erase the 4 KiB sector containing `address` to 0xFF
	pub fn sector_erase(&mut self, address: u32) -> crate::AResult<()> {
		self.check_range(address, 1)?;

		self.write_enable();
		{
			let mut sel = self.bus.select();
			send_command(&mut sel, SECTOR_ERASE_4KB, address);
		}
		debug!("W25Q64: erase sector 0x{:06x}", address & !(SECTOR_SIZE - 1));
		self.finish_busy("sector erase", address)
	}

	/// Read continuously from `address`; the chip doesn't care about page
	/// boundaries, only the end of the array.
	pub fn read_data(&mut self, address: u32, target: &mut [u8]) -> crate::AResult<()> {
		if target.is_empty() {
			return Ok(());
		}
		self.check_range(address, target.len())?;
		{
			let mut sel = self.bus.select();
			send_command(&mut sel, READ_DATA, address);
			sel.read(target);
		}
		debug!("W25Q64: read {} bytes at 0x{:06x}", target.len(), address);
		Ok(())
	}

	pub fn read(&mut self, address: u32, count: usize) -> crate::AResult<Vec<u8>> {
		let mut buf = vec![0u8; count];
		self.read_data(address, &mut buf)?;
		Ok(buf)
	}

	/// program `data` at any address, split into page sized chunks
	pub fn write(&mut self, address: u32, data: &[u8]) -> crate::AResult<()> {
		if data.is_empty() {
			return Ok(());
		}
		self.check_range(address, data.len())?;
		let mut address = address;
		let mut rest = data;
		while !rest.is_empty() {
			let room = (PAGE_SIZE - address % PAGE_SIZE) as usize;
			let (chunk, tail) = rest.split_at(room.min(rest.len()));
			with_context!(("write at 0x{:06x}", address), {
				self.page_program(address, chunk)
			})?;
			address += chunk.len() as u32;
			rest = tail;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sim::FlashBus;

	fn flash(bus: FlashBus) -> W25q64<FlashBus> {
		let mut flash = W25q64::new(bus).with_busy_wait(WaitPolicy::attempts(1000));
		flash.init();
		flash
	}

	fn downcast(e: &failure::Error) -> Option<BusError> {
		e.downcast_ref::<BusError>().cloned()
	}

	#[test]
	fn read_id_combines_device_bytes() {
		let mut f = flash(FlashBus::new().with_jedec_id([0xef, 0x40, 0x16]));
		assert_eq!(f.read_id(), (0xef, 0x4016));
		assert_eq!(f.read_id().0, MANUFACTURER_WINBOND);
	}

	#[test]
	fn program_then_read_back() {
		let mut f = flash(FlashBus::new());
		f.sector_erase(0).unwrap();
		f.page_program(0, &[0x01, 0x02, 0x03, 0x04]).unwrap();
		// write enable right in front of each program / erase
		assert_eq!(f.bus().executed(), &[WRITE_ENABLE, SECTOR_ERASE_4KB, WRITE_ENABLE, PAGE_PROGRAM]);
		assert_eq!(f.read(0, 4).unwrap(), vec![0x01, 0x02, 0x03, 0x04]);
		assert!(!f.bus().is_busy());
	}

	#[test]
	fn erase_sets_whole_sector() {
		let mut bus = FlashBus::new();
		for b in &mut bus.memory_mut()[0x1000..0x3000] {
			*b = 0x00;
		}
		let mut f = flash(bus);
		f.sector_erase(0x1234).unwrap();
		assert!(f.read(0x1000, 4096).unwrap().iter().all(|b| *b == 0xff));
		assert_eq!(f.read(0x0fff, 1).unwrap(), vec![0xff]);
		assert_eq!(f.read(0x2000, 1).unwrap(), vec![0x00]);
	}

	#[test]
	fn busy_wait_counts_polls() {
		let mut f = flash(FlashBus::new().with_busy_polls(17, 0));
		f.write_enable();
		f.bus_mut().select().write(&[PAGE_PROGRAM, 0, 0, 0, 0xaa]);
		f.bus_mut().clear_log();
		assert_eq!(f.wait_busy(), WaitOutcome::Ready { polls: 17 });
		assert_eq!(f.bus().status_reads(), 18);
	}

	#[test]
	fn busy_wait_gives_up() {
		let mut f = flash(FlashBus::new().with_busy_polls(u32::max_value(), 0))
			.with_busy_wait(WaitPolicy::attempts(64));
		f.write_enable();
		f.bus_mut().select().write(&[PAGE_PROGRAM, 0, 0, 0, 0xaa]);
		f.bus_mut().clear_log();
		assert_eq!(f.wait_busy(), WaitOutcome::TimedOut { attempts: 64 });
		assert_eq!(f.bus().status_reads(), 64);
	}

	#[test]
	fn timeout_reported_by_default() {
		let mut f = flash(FlashBus::new().with_busy_polls(u32::max_value(), u32::max_value()))
			.with_busy_wait(WaitPolicy::attempts(10));
		let e = f.sector_erase(0).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::Timeout { attempts: 10 }));
	}

	#[test]
	fn timeout_swallowed_when_proceeding() {
		let mut bus = FlashBus::new().with_busy_polls(u32::max_value(), 0);
		bus.memory_mut()[0] = 0x00;
		let mut f = flash(bus)
			.with_busy_wait(WaitPolicy::attempts(10))
			.with_timeout_policy(TimeoutPolicy::Proceed);
		f.page_program(0x10, &[0x55]).unwrap();
		// chip is still busy: erase gets dropped, reads don't show the data
		f.sector_erase(0).unwrap();
		assert_eq!(f.bus().rejected(), &[WRITE_ENABLE, SECTOR_ERASE_4KB]);
		assert_eq!(f.read(0x10, 1).unwrap(), vec![0xff]);
		assert_eq!(f.bus().memory()[0], 0x00);
		assert_eq!(f.bus().memory()[0x10], 0x55);
	}

	#[test]
	fn page_boundaries_are_checked() {
		let mut f = flash(FlashBus::new());
		let e = f.page_program(0xf0, &[0u8; 0x20]).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::PageOverflow { address: 0xf0, len: 0x20 }));
		let e = f.page_program(0, &[0u8; 257]).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::PageOverflow { address: 0, len: 257 }));
		f.page_program(0xf0, &[0u8; 0x10]).unwrap();
		// rejected before touching the bus
		assert_eq!(f.bus().executed(), &[WRITE_ENABLE, PAGE_PROGRAM]);
	}

	#[test]
	fn ranges_are_checked() {
		let mut f = flash(FlashBus::with_capacity(CAPACITY as usize));
		let e = f.sector_erase(CAPACITY).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::AddressOutOfRange { address: CAPACITY }));
		let e = f.read(CAPACITY - 2, 4).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::AddressOutOfRange { address: CAPACITY + 1 }));
		assert_eq!(f.read(CAPACITY - 2, 2).unwrap(), vec![0xff, 0xff]);
		assert!(f.bus().executed().iter().all(|c| *c == READ_DATA));
	}

	#[test]
	fn empty_operations_never_fail_or_touch_the_bus() {
		let mut f = flash(FlashBus::new());
		for &address in &[0, CAPACITY - 1, CAPACITY, u32::max_value()] {
			assert_eq!(f.read(address, 0).unwrap(), Vec::<u8>::new());
			f.write(address, &[]).unwrap();
			f.page_program(address, &[]).unwrap();
		}
		assert!(f.bus().executed().is_empty());

		let e = f.write(CAPACITY, &[0]).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::AddressOutOfRange { address: CAPACITY }));
		let e = f.page_program(CAPACITY, &[0]).unwrap_err();
		assert_eq!(downcast(&e), Some(BusError::AddressOutOfRange { address: CAPACITY }));
	}

	#[test]
	fn write_splits_into_pages() {
		let mut f = flash(FlashBus::new());
		let data: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
		f.write(0x1f0, &data).unwrap();
		assert_eq!(f.read(0x1f0, data.len()).unwrap(), data);
		let programs = f.bus().executed().iter().filter(|c| **c == PAGE_PROGRAM).count();
		// 0x1f0..0x200, 0x200..0x300, 0x300..0x400, 0x400..0x448
		assert_eq!(programs, 4);
	}

	#[test]
	fn write_disable_clears_latch() {
		let mut f = flash(FlashBus::new());
		f.write_enable();
		assert_eq!(f.read_status() & STATUS_WEL, STATUS_WEL);
		f.write_disable();
		assert_eq!(f.read_status(), 0);
	}
}
