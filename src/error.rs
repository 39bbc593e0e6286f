use std::fmt;

/// Which byte of a register transaction wasn't acknowledged
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NackStage {
	AddressWrite,
	AddressRead,
	Register,
	Value,
}

impl fmt::Display for NackStage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let name = match self {
			NackStage::AddressWrite => "slave address (write)",
			NackStage::AddressRead => "slave address (read)",
			NackStage::Register => "register address",
			NackStage::Value => "register value",
		};
		f.write_str(name)
	}
}

/// Protocol level failures callers need to tell apart; everything else is
/// reported through plain `failure::Error` messages.
///
/// Recover with `err.downcast_ref::<BusError>()`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub enum BusError {
	#[fail(display = "no acknowledge for {}", stage)]
	Nack { stage: NackStage },

	#[fail(display = "device still busy after {} polls", attempts)]
	Timeout { attempts: u32 },

	#[fail(display = "{} bytes at 0x{:06x} don't fit into one page", len, address)]
	PageOverflow { address: u32, len: usize },

	#[fail(display = "address 0x{:x} out of range", address)]
	AddressOutOfRange { address: u32 },

	#[fail(display = "invalid 7-bit slave address 0x{:02x}", address)]
	InvalidSlaveAddress { address: u8 },
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn downcast_from_failure_error() {
		let e: failure::Error = BusError::Timeout { attempts: 7 }.into();
		assert_eq!(e.downcast_ref::<BusError>(), Some(&BusError::Timeout { attempts: 7 }));
		assert_eq!(e.to_string(), "device still busy after 7 polls");
	}

	#[test]
	fn nack_message_names_stage() {
		let e = BusError::Nack { stage: NackStage::Register };
		assert_eq!(e.to_string(), "no acknowledge for register address");
	}
}
