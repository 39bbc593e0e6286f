/// Bit-banged serial bus masters
///
/// Two-wire bus (I²C style), open drain clock SCL and data SDA, idle high:
/// - Start: SDA falls while SCL is high
/// - Stop: SDA rises while SCL is high
/// - Data: 8 bits MSB first, SDA only changes while SCL is low and is
///   sampled on the rising SCL edge
/// - Acknowledge: ninth clock; the receiver pulls SDA low to acknowledge,
///   leaving it high is a not-acknowledge
/// - Repeated start: a start without a stop before, to switch direction
///   while keeping the bus
///
/// Four-wire bus (SPI mode 0), chip select CS (active low), clock SCK (idle
/// low), MOSI and MISO:
/// - A transaction spans one CS low phase
/// - Each byte is exchanged full-duplex, MSB first, both sides sample on the
///   rising SCK edge
///
/// Both masters only ever talk to a single slave and never arbitrate.

mod hardware;
mod four_wire;
mod two_wire;

pub use self::hardware::{
	FOUR_WIRE_SETTLE,
	FourWire,
	TWO_WIRE_SETTLE,
	TwoWire,
	reliable_sleep,
};

pub use self::two_wire::{
	Ack,
	Direction,
	SlaveAddress,
	Transaction,
	TwoWireExt,
};

pub use self::four_wire::{
	DUMMY_BYTE,
	FourWireExt,
	Selection,
};
