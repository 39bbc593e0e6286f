use crate::bus::FourWire;

const WRITE_ENABLE: u8 = 0x06;
const WRITE_DISABLE: u8 = 0x04;
const READ_STATUS: u8 = 0x05;
const READ_DATA: u8 = 0x03;
const PAGE_PROGRAM: u8 = 0x02;
const SECTOR_ERASE: u8 = 0x20;
const JEDEC_ID: u8 = 0x9f;

const PAGE_SIZE: usize = 256;
const SECTOR_SIZE: usize = 4096;

/// Four-wire lines with a simulated W25Q-series NOR flash attached.
///
/// Commands are decoded from the line transitions. Program and erase only
/// run with the write enable latch set and leave the chip busy for a
/// configurable number of status polls.
pub struct FlashBus {
	select: bool,
	clock: bool,
	mosi: bool,
	miso: bool,

	memory: Vec<u8>,
	jedec_id: [u8; 3],
	program_polls: u32,
	erase_polls: u32,

	bits: u8,
	shift: u8,
	index: usize,
	command: Option<u8>,
	address: u32,
	payload: Vec<u8>,
	out: u8,

	write_enabled: bool,
	busy_remaining: u32,
	status_reads: u32,
	executed: Vec<u8>,
	rejected: Vec<u8>,
}

impl FlashBus {
	/// 8 MiB, erased, manufacturer 0xEF device 0x4017
	pub fn new() -> Self {
		Self::with_capacity(8 << 20)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		FlashBus {
			select: true,
			clock: false,
			mosi: false,
			miso: true,
			memory: vec![0xff; capacity],
			jedec_id: [0xef, 0x40, 0x17],
			program_polls: 3,
			erase_polls: 40,
			bits: 0,
			shift: 0,
			index: 0,
			command: None,
			address: 0,
			payload: Vec::new(),
			out: 0xff,
			write_enabled: false,
			busy_remaining: 0,
			status_reads: 0,
			executed: Vec::new(),
			rejected: Vec::new(),
		}
	}

	pub fn with_jedec_id(mut self, id: [u8; 3]) -> Self {
		self.jedec_id = id;
		self
	}

	/// status polls reporting BUSY after a program / erase
	pub fn with_busy_polls(mut self, program: u32, erase: u32) -> Self {
		self.program_polls = program;
		self.erase_polls = erase;
		self
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	pub fn is_busy(&self) -> bool {
		self.busy_remaining > 0
	}

	pub fn is_write_enabled(&self) -> bool {
		self.write_enabled
	}

	/// status bytes clocked out since creation (or last `clear_log`)
	pub fn status_reads(&self) -> u32 {
		self.status_reads
	}

	/// opcodes of completed commands except status reads, in order
	pub fn executed(&self) -> &[u8] {
		&self.executed
	}

	/// program/erase commands dropped for lack of write enable or busy chip
	pub fn rejected(&self) -> &[u8] {
		&self.rejected
	}

	pub fn clear_log(&mut self) {
		self.status_reads = 0;
		self.executed.clear();
		self.rejected.clear();
	}

	fn status(&self) -> u8 {
		let mut status = 0u8;
		if self.busy_remaining > 0 {
			status |= 0x01;
		}
		if self.write_enabled {
			status |= 0x02;
		}
		status
	}

	fn begin(&mut self) {
		self.bits = 0;
		self.shift = 0;
		self.index = 0;
		self.command = None;
		self.address = 0;
		self.payload.clear();
		self.out = 0xff;
		self.miso = true;
	}

	// `out` is what the next byte shifts out
	fn on_byte(&mut self, byte: u8) {
		let index = self.index;
		self.index += 1;

		let command = match self.command {
			None => {
				self.command = Some(byte);
				self.out = match byte {
					JEDEC_ID => self.jedec_id[0],
					READ_STATUS => self.status(),
					_ => 0xff,
				};
				return;
			},
			Some(c) => c,
		};

		match command {
			JEDEC_ID => {
				self.out = self.jedec_id.get(index).cloned().unwrap_or(0xff);
			},
			READ_STATUS => {
				self.status_reads += 1;
				if self.busy_remaining > 0 {
					self.busy_remaining -= 1;
					if 0 == self.busy_remaining {
						self.write_enabled = false;
					}
				}
				self.out = self.status();
			},
			READ_DATA => {
				if index <= 3 {
					self.address = self.address << 8 | byte as u32;
				}
				if index >= 3 {
					self.out = if self.busy_remaining > 0 {
						0xff
					} else {
						self.memory[self.address as usize % self.memory.len()]
					};
					self.address = self.address.wrapping_add(1);
				}
			},
			PAGE_PROGRAM | SECTOR_ERASE => {
				if index <= 3 {
					self.address = self.address << 8 | byte as u32;
				} else {
					self.payload.push(byte);
				}
			},
			_ => (),
		}
	}

	// commands take effect when CS goes high
	fn finish(&mut self) {
		let command = match self.command {
			Some(c) => c,
			None => return,
		};
		let complete = 0 == self.bits;
		if !complete {
			return;
		}

		if self.busy_remaining > 0 && READ_STATUS != command {
			self.rejected.push(command);
			return;
		}

		match command {
			WRITE_ENABLE => self.write_enabled = true,
			WRITE_DISABLE => self.write_enabled = false,
			PAGE_PROGRAM | SECTOR_ERASE if self.index < 4 || !self.write_enabled => {
				self.rejected.push(command);
				return;
			},
			PAGE_PROGRAM => {
				let len = self.memory.len();
				let page = self.address as usize % len & !(PAGE_SIZE - 1);
				let start = self.address as usize % PAGE_SIZE;
				// only the last page worth of data sticks
				let skip = self.payload.len().saturating_sub(PAGE_SIZE);
				for (i, b) in self.payload.iter().enumerate().skip(skip) {
					let offset = (start + i) % PAGE_SIZE;
					self.memory[page + offset] &= *b;
				}
				self.start_busy(self.program_polls);
			},
			SECTOR_ERASE => {
				let len = self.memory.len();
				let sector = self.address as usize % len & !(SECTOR_SIZE - 1);
				let end = (sector + SECTOR_SIZE).min(len);
				for b in &mut self.memory[sector..end] {
					*b = 0xff;
				}
				self.start_busy(self.erase_polls);
			},
			READ_STATUS => return,
			_ => (),
		}
		self.executed.push(command);
	}

	fn start_busy(&mut self, polls: u32) {
		self.busy_remaining = polls;
		if 0 == polls {
			self.write_enabled = false;
		}
	}
}

impl Default for FlashBus {
	fn default() -> Self {
		Self::new()
	}
}

impl FourWire for FlashBus {
	fn set_select(&mut self, level: bool) {
		if self.select && !level {
			self.begin();
		} else if !self.select && level {
			self.finish();
		}
		self.select = level;
	}

	fn set_clock(&mut self, level: bool) {
		let rising = level && !self.clock;
		let falling = !level && self.clock;
		self.clock = level;
		if self.select {
			return;
		}
		if rising {
			self.shift = self.shift << 1 | self.mosi as u8;
			self.bits += 1;
			if 8 == self.bits {
				let byte = self.shift;
				self.bits = 0;
				self.shift = 0;
				self.on_byte(byte);
			}
		} else if falling {
			self.miso = 0 != self.out & (0x80 >> self.bits);
		}
	}

	fn set_mosi(&mut self, level: bool) {
		self.mosi = level;
	}

	fn read_miso(&mut self) -> bool {
		// high impedance output reads as pulled up
		self.select || self.miso
	}

	fn delay(&mut self) {
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bus::FourWireExt;

	#[test]
	fn jedec_id_shifts_out_after_command() {
		let mut flash = FlashBus::new().with_jedec_id([0xef, 0x40, 0x16]);
		let mut id = [0u8; 3];
		{
			let mut sel = flash.select();
			assert_eq!(sel.transfer(JEDEC_ID), 0xff);
			sel.read(&mut id);
		}
		assert_eq!(id, [0xef, 0x40, 0x16]);
	}

	#[test]
	fn program_needs_write_enable() {
		let mut flash = FlashBus::with_capacity(4096);
		flash.select().write(&[PAGE_PROGRAM, 0, 0, 0, 0x12]);
		assert_eq!(flash.memory()[0], 0xff);
		assert_eq!(flash.rejected(), &[PAGE_PROGRAM]);

		flash.select().write(&[WRITE_ENABLE]);
		assert!(flash.is_write_enabled());
		flash.select().write(&[PAGE_PROGRAM, 0, 0, 0, 0x12]);
		assert_eq!(flash.memory()[0], 0x12);
		assert!(flash.is_busy());
	}

	#[test]
	fn busy_clears_after_configured_polls() {
		let mut flash = FlashBus::with_capacity(4096).with_busy_polls(2, 2);
		flash.select().write(&[WRITE_ENABLE]);
		flash.select().write(&[SECTOR_ERASE, 0, 0, 0]);
		let mut status = [0u8; 3];
		{
			let mut sel = flash.select();
			sel.transfer(READ_STATUS);
			sel.read(&mut status);
		}
		assert_eq!(status, [0x03, 0x03, 0x00]);
		assert_eq!(flash.status_reads(), 3);
		assert!(!flash.is_write_enabled());
	}

	#[test]
	fn program_wraps_within_page() {
		let mut flash = FlashBus::with_capacity(4096).with_busy_polls(0, 0);
		flash.select().write(&[WRITE_ENABLE]);
		flash.select().write(&[PAGE_PROGRAM, 0x00, 0x01, 0xff, 0xaa, 0xbb]);
		assert_eq!(flash.memory()[0x1ff], 0xaa);
		assert_eq!(flash.memory()[0x100], 0xbb);
		assert_eq!(flash.memory()[0x200], 0xff);
	}
}
