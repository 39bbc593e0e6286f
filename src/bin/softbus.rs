#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate softbus;
use softbus::*;

use std::process::exit;
use std::time::Duration;

use softbus::bus::{
	FourWire,
	TwoWire,
};
use softbus::mpu6050::{
	AckPolicy,
	Mpu6050,
	registers::DEVICE_ID,
};
use softbus::w25q64::{
	TimeoutPolicy,
	W25q64,
};

// decimal or 0x-prefixed hex
fn parse_number(s: &str) -> AResult<u64> {
	let r = if s.starts_with("0x") || s.starts_with("0X") {
		u64::from_str_radix(&s[2..], 16)
	} else {
		s.parse::<u64>()
	};
	Ok(r?)
}

fn get_number(matches: &clap::ArgMatches, name: &str, max: u64) -> AResult<u64> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let v = parse_number(param).map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		failure::Error::from(e.context(msg))
	})?;
	ensure!(v <= max, "parameter {} too big: {} (max {})", name, v, max);
	Ok(v)
}

fn get_pin(matches: &clap::ArgMatches, name: &str) -> AResult<u32> {
	ensure!(matches.is_present(name), "--{} is required unless --simulate is given", name);
	Ok(get_number(matches, name, u32::max_value() as u64)? as u32)
}

fn get_settle(matches: &clap::ArgMatches) -> AResult<Option<Duration>> {
	if !matches.is_present("settle") {
		return Ok(None);
	}
	Ok(Some(Duration::from_micros(get_number(matches, "settle", 1_000_000)?)))
}

// "01 02 0a", "01020a" and "0x01,0x02" all work
fn parse_hex_bytes(s: &str) -> AResult<Vec<u8>> {
	let mut digits = String::new();
	for part in s.split(|c: char| c == ',' || c.is_whitespace()) {
		let part = part.trim_start_matches("0x").trim_start_matches("0X");
		if part.len() % 2 == 1 {
			digits.push('0');
		}
		digits.push_str(part);
	}
	ensure!(digits.is_ascii(), "invalid hex data {:?}", s);
	let mut result = Vec::with_capacity(digits.len() / 2);
	for i in (0..digits.len()).step_by(2) {
		let byte = u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| {
			let e = failure::Error::from(e);
			let msg = format!("invalid hex data {:?}: {}", s, e);
			failure::Error::from(e.context(msg))
		})?;
		result.push(byte);
	}
	ensure!(!result.is_empty(), "no data given");
	Ok(result)
}

fn hexdump(address: u32, data: &[u8]) {
	for (i, chunk) in data.chunks(16).enumerate() {
		print!("{:06x} ", address as usize + 16 * i);
		for (j, b) in chunk.iter().enumerate() {
			if 8 == j {
				print!(" ");
			}
			print!(" {:02x}", b);
		}
		println!();
	}
}

fn run_mpu6050<H: TwoWire>(mut dev: Mpu6050<H>, sub_m: &clap::ArgMatches) -> AResult<()> {
	match sub_m.subcommand() {
		("id", _) => {
			let id = dev.get_id()?;
			println!("WHO_AM_I: 0x{:02x}", id);
			if id != DEVICE_ID {
				warn!("unexpected WHO_AM_I 0x{:02x} (expected 0x{:02x})", id, DEVICE_ID);
			}
		},
		("init", _) => {
			dev.init()?;
			info!("MPU6050 {} initialized", dev.address());
		},
		("read_reg", Some(m)) => {
			let register = get_number(m, "REG", 0xff)? as u8;
			println!("0x{:02x}: 0x{:02x}", register, dev.read_register(register)?);
		},
		("write_reg", Some(m)) => {
			let register = get_number(m, "REG", 0xff)? as u8;
			let value = get_number(m, "VALUE", 0xff)? as u8;
			dev.write_register(register, value)?;
		},
		("axes", Some(m)) => {
			let count = if m.is_present("count") { get_number(m, "count", u32::max_value() as u64)? } else { 1 };
			dev.init()?;
			for _ in 0..count {
				dev.wait_data_ready()?;
				let axes = if m.is_present("burst") { dev.read_axes_burst()? } else { dev.read_axes()? };
				let a = axes.accel_g();
				let g = axes.gyro_dps();
				println!(
					"accel {:6} {:6} {:6} ({:+.3} {:+.3} {:+.3} g)  gyro {:6} {:6} {:6} ({:+.1} {:+.1} {:+.1} °/s)",
					axes.accel[0], axes.accel[1], axes.accel[2], a[0], a[1], a[2],
					axes.gyro[0], axes.gyro[1], axes.gyro[2], g[0], g[1], g[2],
				);
			}
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand for 'mpu6050' {:?}", cmd),
	}
	Ok(())
}

fn run_w25q64<H: FourWire>(mut flash: W25q64<H>, sub_m: &clap::ArgMatches) -> AResult<()> {
	flash.init();
	let max_address = flash.capacity() as u64 - 1;
	match sub_m.subcommand() {
		("id", _) => {
			let (manufacturer, device) = flash.read_id();
			println!("manufacturer: 0x{:02x}, device: 0x{:04x}", manufacturer, device);
		},
		("status", _) => {
			let status = flash.read_status();
			println!("status: 0x{:02x}{}{}", status,
				if 0 != status & 0x01 { " [BUSY]" } else { "" },
				if 0 != status & 0x02 { " [WEL]" } else { "" },
			);
		},
		("read", Some(m)) => {
			let address = get_number(m, "ADDRESS", max_address)? as u32;
			let len = get_number(m, "LENGTH", flash.capacity() as u64)? as usize;
			let data = flash.read(address, len)?;
			hexdump(address, &data);
		},
		("erase", Some(m)) => {
			let address = get_number(m, "ADDRESS", max_address)? as u32;
			flash.sector_erase(address)?;
			info!("erased sector 0x{:06x}", address & !(w25q64::SECTOR_SIZE - 1));
		},
		("program", Some(m)) => {
			let address = get_number(m, "ADDRESS", max_address)? as u32;
			let data = parse_hex_bytes(m.value_of("DATA").unwrap_or(""))?;
			flash.page_program(address, &data)?;
		},
		("write", Some(m)) => {
			let address = get_number(m, "ADDRESS", max_address)? as u32;
			let data = parse_hex_bytes(m.value_of("DATA").unwrap_or(""))?;
			flash.write(address, &data)?;
			let check = flash.read(address, data.len())?;
			if check != data {
				hexdump(address, &check);
				bail!("verify failed at 0x{:06x}: flash content differs (sector not erased?)", address);
			}
			info!("wrote and verified {} bytes at 0x{:06x}", data.len(), address);
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand for 'w25q64' {:?}", cmd),
	}
	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg simulate: -s --simulate "use simulated devices instead of GPIO lines")
		(@arg lenient: -l --lenient "continue after missing acknowledges and busy timeouts")
		(@arg settle: --settle +takes_value "delay after each line transition in µs")
		(@subcommand mpu6050 =>
			(about: "MPU6050 on a bit-banged two-wire bus")
			(@setting SubcommandRequiredElseHelp)
			(@arg scl: --scl +takes_value "GPIO number of the clock line")
			(@arg sda: --sda +takes_value "GPIO number of the data line")
			(@subcommand id =>
				(about: "read WHO_AM_I")
			)
			(@subcommand init =>
				(about: "wake up and configure sample rate and ranges")
			)
			(@subcommand read_reg =>
				(about: "read one register")
				(@arg REG: +required "register address")
			)
			(@subcommand write_reg =>
				(about: "write one register")
				(@arg REG: +required "register address")
				(@arg VALUE: +required "value to write")
			)
			(@subcommand axes =>
				(about: "init and print accelerometer and gyroscope samples")
				(@arg count: -n --count +takes_value "number of samples (default 1)")
				(@arg burst: -b --burst "read all axes in one transaction")
			)
		)
		(@subcommand w25q64 =>
			(about: "W25Q64 flash on a bit-banged four-wire bus")
			(@setting SubcommandRequiredElseHelp)
			(@arg cs: --cs +takes_value "GPIO number of chip select")
			(@arg sck: --sck +takes_value "GPIO number of the clock line")
			(@arg mosi: --mosi +takes_value "GPIO number of MOSI")
			(@arg miso: --miso +takes_value "GPIO number of MISO")
			(@subcommand id =>
				(about: "read JEDEC manufacturer and device id")
			)
			(@subcommand status =>
				(about: "read status register 1")
			)
			(@subcommand read =>
				(about: "hexdump flash content")
				(@arg ADDRESS: +required "start address")
				(@arg LENGTH: +required "number of bytes")
			)
			(@subcommand erase =>
				(about: "erase the 4 KiB sector containing ADDRESS")
				(@arg ADDRESS: +required "address within the sector")
			)
			(@subcommand program =>
				(about: "program up to one page (no page crossing)")
				(@arg ADDRESS: +required "start address")
				(@arg DATA: +required "hex bytes")
			)
			(@subcommand write =>
				(about: "program any number of bytes and verify")
				(@arg ADDRESS: +required "start address")
				(@arg DATA: +required "hex bytes")
			)
		)
	).get_matches();

	let simulate = matches.is_present("simulate");
	let lenient = matches.is_present("lenient");
	let settle = get_settle(&matches)?;

	match matches.subcommand() {
		("mpu6050", Some(sub_m)) => {
			let policy = if lenient { AckPolicy::Ignore } else { AckPolicy::Strict };
			if simulate {
				let mut model = sim::Mpu6050Model::new();
				model.set_axes([0, 0, 2048], [0, 0, 0]);
				run_mpu6050(Mpu6050::new(sim::I2cBus::new(model)).with_ack_policy(policy), sub_m)
			} else {
				let mut pins = gpio::TwoWirePins::open(get_pin(sub_m, "scl")?, get_pin(sub_m, "sda")?)?;
				if let Some(settle) = settle {
					pins = pins.with_settle(settle);
				}
				run_mpu6050(Mpu6050::new(pins).with_ack_policy(policy), sub_m)
			}
		},
		("w25q64", Some(sub_m)) => {
			let policy = if lenient { TimeoutPolicy::Proceed } else { TimeoutPolicy::Report };
			if simulate {
				run_w25q64(W25q64::new(sim::FlashBus::new()).with_timeout_policy(policy), sub_m)
			} else {
				let mut pins = gpio::FourWirePins::open(
					get_pin(sub_m, "cs")?,
					get_pin(sub_m, "sck")?,
					get_pin(sub_m, "mosi")?,
					get_pin(sub_m, "miso")?,
				)?;
				if let Some(settle) = settle {
					pins = pins.with_settle(settle);
				}
				run_w25q64(W25q64::new(pins).with_timeout_policy(policy), sub_m)
			}
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
