use crate::DobotError;

/// Protocol commands understood by the controller firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Ready = 0,
    Steps = 1,
    ExecQueue = 2,
    GetAccels = 3,
    SwitchToAccelReportMode = 4,
    CalibrateJoint = 5,
    EmergencyStop = 6,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::Steps),
            2 => Some(Self::ExecQueue),
            3 => Some(Self::GetAccels),
            4 => Some(Self::SwitchToAccelReportMode),
            5 => Some(Self::CalibrateJoint),
            6 => Some(Self::EmergencyStop),
            _ => None,
        }
    }

    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// `ExecQueue` has no firmware counterpart yet. Entering the
    /// accelerometer report mode cannot be undone over SPI; hold the
    /// "Sensor Calibration" button while connecting instead.
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::ExecQueue | Self::SwitchToAccelReportMode)
    }
}

/// Opcode of a command that can be put on the wire.
///
/// Only supported commands have one, so the transaction layer can never
/// send `ExecQueue` or `SwitchToAccelReportMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(Command);

impl Opcode {
    pub const READY: Opcode = Opcode(Command::Ready);
    pub const STEPS: Opcode = Opcode(Command::Steps);
    pub const GET_ACCELS: Opcode = Opcode(Command::GetAccels);
    pub const CALIBRATE_JOINT: Opcode = Opcode(Command::CalibrateJoint);
    pub const EMERGENCY_STOP: Opcode = Opcode(Command::EmergencyStop);

    pub const fn command(self) -> Command {
        self.0
    }

    pub const fn value(self) -> u8 {
        self.0.opcode()
    }
}

impl TryFrom<Command> for Opcode {
    type Error = DobotError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        if command.is_supported() {
            Ok(Opcode(command))
        } else {
            Err(DobotError::Unsupported(command))
        }
    }
}
