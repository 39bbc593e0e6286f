use std::fs;
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::{
	Path,
	PathBuf,
};
use std::thread;
use std::time::Duration;

const GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Mode {
	Input,
	Output,
}

fn write_all_at(file: &fs::File, buf: &[u8]) -> io::Result<()> {
	// sysfs attributes take the whole value in one write
	let l = file.write_at(buf, 0)?;
	if l != buf.len() {
		Err(io::Error::new(io::ErrorKind::Other, "failed to write whole buffer"))
	} else {
		Ok(())
	}
}

// keeps other processes from driving the same line while we own it
fn lock_exclusive(file: &fs::File) -> io::Result<()> {
	let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
	if 0 != res {
		return Err(io::Error::last_os_error());
	}
	Ok(())
}

fn open_rw(path: PathBuf) -> io::Result<fs::File> {
	fs::OpenOptions::new()
		.read(true)
		.write(true)
		.open(path)
}

/// A line we exported ourselves; unexported again when dropped.
struct Export {
	root: PathBuf,
	number: u32,
}

impl Export {
	fn new(root: &Path, number: u32) -> io::Result<Self> {
		fs::write(root.join("export"), number.to_string())?;
		Ok(Export {
			root: root.to_path_buf(),
			number,
		})
	}
}

impl Drop for Export {
	fn drop(&mut self) {
		if let Err(e) = fs::write(self.root.join("unexport"), self.number.to_string()) {
			warn!("GPIO {}: couldn't unexport: {}", self.number, e);
		}
	}
}

/// One line exported through the (legacy) sysfs GPIO interface.
///
/// The value file stays open and locked for the lifetime of the pin; the
/// line is unexported again on drop if we exported it.
pub struct SysfsPin {
	number: u32,
	value: fs::File,
	direction: fs::File,
	mode: Option<Mode>,
	// last: files are closed before the line goes away
	export: Option<Export>,
}

impl SysfsPin {
	pub fn open(number: u32) -> crate::AResult<Self> {
		Self::open_at(Path::new(GPIO_ROOT), number)
	}

	/// open below another sysfs GPIO directory than `/sys/class/gpio`
	pub fn open_at(root: &Path, number: u32) -> crate::AResult<Self> {
		with_context!(("GPIO {}", number), {
			let dir = root.join(format!("gpio{}", number));
			let export = if dir.exists() {
				None
			} else {
				Some(Export::new(root, number)?)
			};

			// udev may need a moment to fix permissions of a fresh export
			let mut tries = 0;
			let direction = loop {
				match open_rw(dir.join("direction")) {
					Ok(f) => break f,
					Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied && tries < 20 => {
						tries += 1;
						thread::sleep(Duration::from_millis(10));
					},
					Err(e) => return Err(e.into()),
				}
			};
			let value = open_rw(dir.join("value"))?;
			if let Err(e) = lock_exclusive(&value) {
				bail!("line already in use: {}", e);
			}
			debug!("GPIO {}: opened (exported here: {})", number, export.is_some());

			Ok(SysfsPin {
				number,
				value,
				direction,
				mode: None,
				export,
			})
		})
	}

	pub fn number(&self) -> u32 {
		self.number
	}

	/// Switch to output, driving `level` right away without a glitch.
	///
	/// The first call writes the direction attribute, which the kernel may
	/// refuse (input-only line, line claimed elsewhere).
	pub fn try_set_output(&mut self, level: bool) -> io::Result<()> {
		if Some(Mode::Output) == self.mode {
			self.write(level);
			return Ok(());
		}
		let dir: &[u8] = if level { b"high" } else { b"low" };
		write_all_at(&self.direction, dir)?;
		self.mode = Some(Mode::Output);
		Ok(())
	}

	pub fn try_set_input(&mut self) -> io::Result<()> {
		if Some(Mode::Input) == self.mode {
			return Ok(());
		}
		write_all_at(&self.direction, b"in")?;
		self.mode = Some(Mode::Input);
		Ok(())
	}

	/// Open drain emulation: low drives the line, high releases it to the
	/// pull-up.
	pub fn try_set_open_drain(&mut self, level: bool) -> io::Result<()> {
		if level {
			self.try_set_input()
		} else {
			self.try_set_output(false)
		}
	}

	// the direction writes below already went through once during setup

	pub fn set_output(&mut self, level: bool) {
		self.try_set_output(level).expect("GPIO direction write must not fail");
	}

	pub fn set_open_drain(&mut self, level: bool) {
		self.try_set_open_drain(level).expect("GPIO direction write must not fail");
	}

	pub fn write(&mut self, level: bool) {
		let v: &[u8] = if level { b"1" } else { b"0" };
		write_all_at(&self.value, v).expect("GPIO value write must not fail");
	}

	pub fn read(&mut self) -> bool {
		let mut buf = [0u8; 2];
		let l = self.value.read_at(&mut buf, 0).expect("GPIO value read must not fail");
		l > 0 && b'1' == buf[0]
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// Fake sysfs GPIO directory below the system temp dir.
	pub struct FakeRoot(pub PathBuf);

	impl FakeRoot {
		pub fn new(name: &str) -> Self {
			let root = std::env::temp_dir().join(format!("softbus-{}-{}", name, std::process::id()));
			let _ = fs::remove_dir_all(&root);
			fs::create_dir_all(&root).unwrap();
			FakeRoot(root)
		}

		pub fn add_line(&self, number: u32) -> PathBuf {
			let dir = self.0.join(format!("gpio{}", number));
			fs::create_dir_all(&dir).unwrap();
			fs::write(dir.join("direction"), "in").unwrap();
			fs::write(dir.join("value"), "1").unwrap();
			dir
		}

		// every write to the direction attribute fails with ENOSPC
		pub fn add_broken_line(&self, number: u32) -> bool {
			if !Path::new("/dev/full").exists() {
				return false;
			}
			let dir = self.0.join(format!("gpio{}", number));
			fs::create_dir_all(&dir).unwrap();
			std::os::unix::fs::symlink("/dev/full", dir.join("direction")).unwrap();
			fs::write(dir.join("value"), "1").unwrap();
			true
		}
	}

	impl Drop for FakeRoot {
		fn drop(&mut self) {
			let _ = fs::remove_dir_all(&self.0);
		}
	}

	#[test]
	fn direction_and_value_files() {
		let root = FakeRoot::new("direction");
		let dir = root.add_line(3);
		let mut pin = SysfsPin::open_at(&root.0, 3).unwrap();
		pin.try_set_output(true).unwrap();
		assert_eq!(fs::read(dir.join("direction")).unwrap(), b"high");
		pin.write(false);
		assert_eq!(fs::read(dir.join("value")).unwrap(), b"0");
		pin.try_set_open_drain(true).unwrap();
		// plain files don't truncate like sysfs attributes do
		assert!(fs::read(dir.join("direction")).unwrap().starts_with(b"in"));
		// present before, so not ours to unexport
		drop(pin);
		assert!(!root.0.join("unexport").exists());
	}

	#[test]
	fn second_open_of_a_line_fails() {
		let root = FakeRoot::new("lock");
		root.add_line(4);
		let _pin = SysfsPin::open_at(&root.0, 4).unwrap();
		let err = SysfsPin::open_at(&root.0, 4).err().unwrap();
		assert!(format!("{}", err).contains("already in use"));
	}

	#[test]
	fn refused_direction_write_is_an_error() {
		let root = FakeRoot::new("refused");
		if !root.add_broken_line(5) {
			return;
		}
		let mut pin = SysfsPin::open_at(&root.0, 5).unwrap();
		assert!(pin.try_set_input().is_err());
		assert!(pin.try_set_output(false).is_err());
	}

	#[test]
	fn failed_open_unexports_again() {
		let root = FakeRoot::new("unexport");
		// export "succeeds" but no gpio7 directory shows up
		let err = SysfsPin::open_at(&root.0, 7).err().unwrap();
		assert!(format!("{}", err).starts_with("GPIO 7"));
		assert_eq!(fs::read_to_string(root.0.join("export")).unwrap(), "7");
		assert_eq!(fs::read_to_string(root.0.join("unexport")).unwrap(), "7");
	}
}
