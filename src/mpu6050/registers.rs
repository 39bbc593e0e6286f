#![allow(dead_code)]

// 7-bit slave address with AD0 low; 0x69 with AD0 high
pub const DEFAULT_ADDRESS: u8 = 0x68;

pub const SMPLRT_DIV: u8 = 0x19;
pub const CONFIG: u8 = 0x1a;
pub const GYRO_CONFIG: u8 = 0x1b;
pub const ACCEL_CONFIG: u8 = 0x1c;

pub const INT_STATUS: u8 = 0x3a;
pub const INT_STATUS_DATA_RDY: u8 = 0x01;

pub const ACCEL_XOUT_H: u8 = 0x3b;
pub const ACCEL_XOUT_L: u8 = 0x3c;
pub const ACCEL_YOUT_H: u8 = 0x3d;
pub const ACCEL_YOUT_L: u8 = 0x3e;
pub const ACCEL_ZOUT_H: u8 = 0x3f;
pub const ACCEL_ZOUT_L: u8 = 0x40;
pub const TEMP_OUT_H: u8 = 0x41;
pub const TEMP_OUT_L: u8 = 0x42;
pub const GYRO_XOUT_H: u8 = 0x43;
pub const GYRO_XOUT_L: u8 = 0x44;
pub const GYRO_YOUT_H: u8 = 0x45;
pub const GYRO_YOUT_L: u8 = 0x46;
pub const GYRO_ZOUT_H: u8 = 0x47;
pub const GYRO_ZOUT_L: u8 = 0x48;

pub const PWR_MGMT_1: u8 = 0x6b;
pub const PWR_MGMT_2: u8 = 0x6c;
pub const WHO_AM_I: u8 = 0x75;

// expected WHO_AM_I content
pub const DEVICE_ID: u8 = 0x68;

// (high, low) register pairs for accel x/y/z, then gyro x/y/z
pub const AXIS_REGISTERS: [(u8, u8); 6] = [
	(ACCEL_XOUT_H, ACCEL_XOUT_L),
	(ACCEL_YOUT_H, ACCEL_YOUT_L),
	(ACCEL_ZOUT_H, ACCEL_ZOUT_L),
	(GYRO_XOUT_H, GYRO_XOUT_L),
	(GYRO_YOUT_H, GYRO_YOUT_L),
	(GYRO_ZOUT_H, GYRO_ZOUT_L),
];

/// register writes done by `Mpu6050::init`, in order
pub const INIT_SEQUENCE: [(u8, u8); 6] = [
	(PWR_MGMT_1, 0x01),   // wake up, PLL with X gyro reference
	(PWR_MGMT_2, 0x00),   // no axis in standby
	(SMPLRT_DIV, 0x09),   // sample rate = 1kHz / 10
	(CONFIG, 0x06),       // strongest low pass filter
	(GYRO_CONFIG, 0x18),  // ±2000 °/s
	(ACCEL_CONFIG, 0x18), // ±16 g
];

// sensitivity at the ranges configured by INIT_SEQUENCE
pub const ACCEL_LSB_PER_G: f32 = 2048.0;
pub const GYRO_LSB_PER_DPS: f32 = 16.4;
