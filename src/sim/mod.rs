/// Line level device simulations
///
/// Both simulations implement the raw line traits of `crate::bus`, so the
/// protocol layers run unchanged against them; nothing above the line
/// driver knows it isn't talking to hardware.

mod flash;
mod i2c;

pub use self::i2c::{
	BusEvent,
	I2cBus,
	Mpu6050Model,
	RegisterDevice,
};

pub use self::flash::FlashBus;
