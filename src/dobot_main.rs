use std::thread;

use log::{debug, warn};

use crate::codec::Field;
use crate::command::{Command, Opcode};
use crate::config::DriverConfig;
use crate::encoders::accel_to_angle;
use crate::transaction::Transport;
use crate::*;

/// Status byte returned by STEPS when the command entered the queue
const STEPS_QUEUED: u8 = 1;

/// Accelerometer readings, each averaged over 17 samples by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accelerometers {
    /// First word on the wire (X)
    pub rear: u16,
    /// Second word on the wire (Y)
    pub front: u16,
}

impl Accelerometers {
    /// Tilt angles in degrees, given the level readings of each sensor
    pub fn angles(&self, rear_offset: f64, front_offset: f64) -> (f64, f64) {
        (
            accel_to_angle(f64::from(self.rear), rear_offset),
            accel_to_angle(f64::from(self.front), front_offset),
        )
    }
}

/// Parameters of a limit-switch calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointCalibration {
    /// Joint to calibrate, 1..=3
    pub joint: u8,
    /// Command value while moving towards the switch, see `freq_to_cmd_val`
    pub forward: u32,
    /// Command value after hitting the switch
    pub backward: u32,
    /// Move the joint backwards to reach the switch
    pub direction: bool,
    /// Firmware pin reference the switch is wired to
    pub pin: u8,
    /// Switch reads HIGH when not triggered
    pub pin_normally_high: bool,
    pub pullup: bool,
}

impl JointCalibration {
    fn control_byte(&self) -> Result<u8> {
        if !(1..=JOINT_COUNT as u8).contains(&self.joint) {
            return Err(DobotError::InvalidJoint(self.joint));
        }
        Ok((u8::from(self.pin_normally_high) << 4)
            | (u8::from(self.pullup) << 3)
            | (u8::from(self.direction) << 2)
            | ((self.joint - 1) & 0x03))
    }
}

fn steps_control_byte(directions: [bool; JOINT_COUNT]) -> u8 {
    (u8::from(directions[0]) << 7)
        | (u8::from(directions[1]) << 6)
        | (u8::from(directions[2]) << 5)
}

/// Dobot controller driver
pub struct Driver<STATE, CHANNEL: ByteChannel> {
    transport: Transport<CHANNEL>,
    config: DriverConfig,
    _state: STATE,
}

/// These functions may be used on a driver whose controller is still booting
impl<CH> Driver<Booting, CH>
where
    CH: ByteChannel,
{
    /// Waits out the controller's reset-on-connect delay and discards
    /// anything it printed meanwhile
    pub fn boot(self) -> Driver<Ready, CH> {
        debug!(
            "waiting {:?} for the controller to boot",
            self.config.boot_delay
        );
        thread::sleep(self.config.boot_delay);
        if let Err(e) = self.transport.flush_input() {
            warn!("could not flush the channel after boot: {}", e);
        }
        Driver {
            transport: self.transport,
            config: self.config,
            _state: Ready,
        }
    }
}

/// These functions may be used on any driver
impl<STATE, CH> Driver<STATE, CH>
where
    CH: ByteChannel,
{
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Releases the channel; dropping it closes the link
    pub fn into_channel(self) -> CH {
        self.transport.into_channel()
    }
}

/// These functions may be used once the controller has booted
impl<CH> Driver<Ready, CH>
where
    CH: ByteChannel,
{
    /// Checks whether the controller is up and running. Returns its status
    /// byte; the firmware answers with the magic number 0x40.
    pub fn ready(&self) -> Result<u8> {
        self.transport.read(Opcode::READY, |codec| codec.read_byte())
    }

    /// Adds a command to the controller's queue.
    ///
    /// `joints` are command values from `steps_to_cmd_val`. Returns whether
    /// the command was queued; `false` means the queue was full.
    pub fn steps(
        &self,
        joints: [u32; JOINT_COUNT],
        directions: [bool; JOINT_COUNT],
    ) -> Result<bool> {
        let status = self.transport.write_read_byte(
            Opcode::STEPS,
            &[
                Field::Long(joints[0]),
                Field::Long(joints[1]),
                Field::Long(joints[2]),
                Field::Byte(steps_control_byte(directions)),
            ],
        )?;
        Ok(status == STEPS_QUEUED)
    }

    /// Executes deferred commands. Not implemented by the firmware.
    pub fn exec_queue(&self) -> Result<()> {
        Err(DobotError::Unsupported(Command::ExecQueue))
    }

    /// Returns the accelerometer readings acquired at power on
    pub fn accelerometers(&self) -> Result<Accelerometers> {
        self.transport.read(Opcode::GET_ACCELS, |codec| {
            let rear = codec.read_word()?;
            let front = codec.read_word()?;
            Ok(Accelerometers { rear, front })
        })
    }

    /// Switching to accelerometer report mode at runtime is impossible on
    /// this hardware: the AVR cannot turn its SPI from slave back to master.
    /// Hold the "Sensor Calibration" button while connecting instead, and
    /// power-cycle the arm to leave the mode.
    pub fn switch_to_accel_report_mode(&self) -> Result<()> {
        Err(DobotError::Unsupported(Command::SwitchToAccelReportMode))
    }

    /// Starts a limit-switch calibration of one joint. Effective immediately;
    /// the command queue is cleared. Cancel with [`Driver::emergency_stop`].
    pub fn calibrate_joint(&self, calibration: &JointCalibration) -> Result<()> {
        let control = calibration.control_byte()?;
        self.transport.write(
            Opcode::CALIBRATE_JOINT,
            &[
                Field::Long(calibration.forward),
                Field::Long(calibration.backward),
                Field::Byte(calibration.pin),
                Field::Byte(control),
            ],
        )
    }

    /// Stops the arm. Clears the command queue and cancels calibration.
    pub fn emergency_stop(&self) -> Result<()> {
        self.transport.write(Opcode::EMERGENCY_STOP, &[])
    }

    /// Drains a desynchronised stream and clears the CRC accumulator
    pub fn resync(&self) -> Result<()> {
        self.transport.resync()
    }
}

pub fn create_driver<CH: ByteChannel>(
    channel: CH,
    config: DriverConfig,
) -> Driver<Booting, CH> {
    Driver {
        transport: Transport::new(channel, &config),
        config,
        _state: Booting,
    }
}
