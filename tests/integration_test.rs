use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dobot::encoders::{accel_to_angle, steps_to_cmd_val};
use dobot::{
    create_driver, ByteChannel, Command, DobotError, Driver, DriverConfig, JointCalibration, Ready,
};
use float_eq::assert_float_eq;

/// Bitwise CRC16-CCITT (0x1021, seed 0xFFFF)
fn ccitt(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[derive(Default)]
struct Wire {
    /// One entry per request frame; `None` keeps the controller silent
    replies: VecDeque<Option<Vec<u8>>>,
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    reads: usize,
    flushes: usize,
}

/// Scripted controller: each request frame releases the next reply
#[derive(Clone, Default)]
struct StubChannel {
    wire: Arc<Mutex<Wire>>,
}

impl StubChannel {
    fn replying(replies: Vec<Option<Vec<u8>>>) -> Self {
        let stub = StubChannel::default();
        stub.wire.lock().unwrap().replies = replies.into();
        stub
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.wire.lock().unwrap().writes.clone()
    }

    fn calls(&self) -> usize {
        let wire = self.wire.lock().unwrap();
        wire.writes.len() + wire.reads + wire.flushes
    }
}

impl ByteChannel for StubChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut wire = self.wire.lock().unwrap();
        wire.writes.push(bytes.to_vec());
        if let Some(Some(reply)) = wire.replies.pop_front() {
            wire.rx.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        wire.reads += 1;
        let n = buf.len().min(wire.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = wire.rx.pop_front().unwrap();
        }
        Ok(n)
    }

    fn flush_input(&mut self) -> io::Result<()> {
        let mut wire = self.wire.lock().unwrap();
        wire.flushes += 1;
        wire.rx.clear();
        Ok(())
    }
}

fn driver(stub: &StubChannel, config: DriverConfig) -> Driver<Ready, StubChannel> {
    create_driver(stub.clone(), config.with_boot_delay(Duration::ZERO)).boot()
}

/// Response bytes followed by the CRC over `covered_prefix` + response
fn reply(covered_prefix: &[u8], fields: &[u8]) -> Vec<u8> {
    let mut covered = covered_prefix.to_vec();
    covered.extend_from_slice(fields);
    let mut out = fields.to_vec();
    out.extend_from_slice(&ccitt(&covered).to_be_bytes());
    out
}

#[test]
fn test_ready_decodes_status_byte() {
    let stub = StubChannel::replying(vec![Some(reply(&[0x00], &[0x01]))]);
    let driver = driver(&stub, DriverConfig::default());

    assert_eq!(driver.ready().unwrap(), 1);

    let crc = ccitt(&[0x00]).to_be_bytes();
    assert_eq!(stub.writes(), vec![vec![0x00, crc[0], crc[1]]]);
}

#[test]
fn test_accelerometers_decode_words_in_wire_order() {
    let stub = StubChannel::replying(vec![Some(reply(&[0x03], &[0x02, 0x00, 0x01, 0xF4]))]);
    let driver = driver(&stub, DriverConfig::default());

    let accels = driver.accelerometers().unwrap();
    assert_eq!(accels.rear, 0x0200);
    assert_eq!(accels.front, 500);

    let (rear, front) = accels.angles(512.0, 500.0);
    assert_float_eq!(rear, 0.0, abs <= 1e-9);
    assert_float_eq!(front, accel_to_angle(500.0, 500.0), abs <= 1e-9);
}

#[test]
fn test_read_rejects_corrupted_checksum() {
    let mut corrupted = reply(&[0x03], &[0x02, 0x00, 0x01, 0xF4]);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x01;
    let stub = StubChannel::replying(vec![Some(corrupted)]);
    let driver = driver(&stub, DriverConfig::default());

    assert!(matches!(
        driver.accelerometers(),
        Err(DobotError::CrcMismatch { .. })
    ));
}

#[test]
fn test_crc_mismatch_is_retried() {
    let good = reply(&[0x00], &[0x40]);
    let mut bad = good.clone();
    bad[1] ^= 0xFF;
    let stub = StubChannel::replying(vec![Some(bad), Some(good)]);
    let driver = driver(&stub, DriverConfig::default().with_attempts(2));

    assert_eq!(driver.ready().unwrap(), 0x40);
    assert_eq!(stub.writes().len(), 2);
}

#[test]
fn test_silent_channel_uses_every_attempt() {
    for attempts in 1..=4u8 {
        let stub = StubChannel::default();
        let driver = driver(&stub, DriverConfig::default().with_attempts(attempts));

        assert!(matches!(driver.ready(), Err(DobotError::Timeout)));
        assert_eq!(stub.writes().len(), attempts as usize);
    }
}

#[test]
fn test_success_on_attempt_k_stops_retrying() {
    let attempts = 5;
    for k in 1..=attempts {
        let mut replies: Vec<Option<Vec<u8>>> = vec![None; k - 1];
        replies.push(Some(reply(&[0x00], &[0x40])));
        let stub = StubChannel::replying(replies);
        let driver = driver(&stub, DriverConfig::default().with_attempts(attempts as u8));

        assert_eq!(driver.ready().unwrap(), 0x40);
        assert_eq!(stub.writes().len(), k);
    }
}

#[test]
fn test_steps_frame_and_queue_status() {
    let joints = [steps_to_cmd_val(10), steps_to_cmd_val(0), 0x0102_0304];
    let mut request = vec![0x01];
    for joint in joints {
        request.extend_from_slice(&joint.to_be_bytes());
    }
    request.push(0xA0);

    let stub = StubChannel::replying(vec![
        Some(reply(&request, &[0x01])),
        Some(reply(&request, &[0x00])),
    ]);
    let driver = driver(&stub, DriverConfig::default());

    assert!(driver.steps(joints, [true, false, true]).unwrap());
    assert!(!driver.steps(joints, [true, false, true]).unwrap());

    let mut expected = request.clone();
    expected.extend_from_slice(&ccitt(&request).to_be_bytes());
    assert_eq!(stub.writes()[0], expected);
}

/// STEPS request body for `joints` with every direction bit clear
fn steps_request(joints: [u32; 3]) -> Vec<u8> {
    let mut request = vec![0x01];
    for joint in joints {
        request.extend_from_slice(&joint.to_be_bytes());
    }
    request.push(0x00);
    request
}

#[test]
fn test_steps_rejects_corrupted_checksum() {
    let joints = [steps_to_cmd_val(4), steps_to_cmd_val(8), steps_to_cmd_val(0)];
    let mut corrupted = reply(&steps_request(joints), &[0x01]);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x01;
    let stub = StubChannel::replying(vec![Some(corrupted)]);
    let driver = driver(&stub, DriverConfig::default());

    assert!(matches!(
        driver.steps(joints, [false; 3]),
        Err(DobotError::CrcMismatch { .. })
    ));
    assert_eq!(stub.writes().len(), 1);
}

#[test]
fn test_steps_checksum_mismatch_is_retried() {
    let joints = [steps_to_cmd_val(4), steps_to_cmd_val(8), steps_to_cmd_val(0)];
    let good = reply(&steps_request(joints), &[0x01]);
    let mut bad = good.clone();
    bad[1] ^= 0x80;
    let stub = StubChannel::replying(vec![Some(bad), Some(good)]);
    let driver = driver(&stub, DriverConfig::default().with_attempts(2));

    assert!(driver.steps(joints, [false; 3]).unwrap());
    let writes = stub.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], writes[1]);
}

#[test]
fn test_emergency_stop_accepts_any_ack_by_default() {
    let stub = StubChannel::replying(vec![Some(vec![0x12, 0x34])]);
    let driver = driver(&stub, DriverConfig::default());

    driver.emergency_stop().unwrap();

    let crc = ccitt(&[0x06]).to_be_bytes();
    assert_eq!(stub.writes(), vec![vec![0x06, crc[0], crc[1]]]);
}

#[test]
fn test_verified_write_ack_must_echo_crc() {
    let echo = ccitt(&[0x06]).to_be_bytes().to_vec();
    let stub = StubChannel::replying(vec![Some(vec![0x12, 0x34]), Some(echo)]);
    let config = DriverConfig::default()
        .with_attempts(2)
        .with_verify_write_ack(true);
    let driver = driver(&stub, config);

    driver.emergency_stop().unwrap();
    assert_eq!(stub.writes().len(), 2);
}

#[test]
fn test_write_times_out_without_ack() {
    let stub = StubChannel::default();
    let driver = driver(&stub, DriverConfig::default().with_attempts(3));

    assert!(matches!(driver.emergency_stop(), Err(DobotError::Timeout)));
    assert_eq!(stub.writes().len(), 3);
}

#[test]
fn test_calibrate_joint_payload() {
    let calibration = JointCalibration {
        joint: 2,
        forward: 0x1122_3344,
        backward: 0x5566_7788,
        direction: true,
        pin: 7,
        pin_normally_high: true,
        pullup: false,
    };
    let stub = StubChannel::replying(vec![Some(vec![0x00, 0x00])]);
    let driver = driver(&stub, DriverConfig::default());

    driver.calibrate_joint(&calibration).unwrap();

    let body = [
        0x05, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x07, 0x15,
    ];
    let mut expected = body.to_vec();
    expected.extend_from_slice(&ccitt(&body).to_be_bytes());
    assert_eq!(stub.writes(), vec![expected]);
}

#[test]
fn test_calibrate_invalid_joint_never_touches_channel() {
    let stub = StubChannel::default();
    let driver = driver(&stub, DriverConfig::default());
    let before = stub.calls();

    for joint in [0, 4] {
        let calibration = JointCalibration {
            joint,
            forward: 0,
            backward: 0,
            direction: false,
            pin: 0,
            pin_normally_high: false,
            pullup: false,
        };
        assert!(matches!(
            driver.calibrate_joint(&calibration),
            Err(DobotError::InvalidJoint(j)) if j == joint
        ));
    }
    assert_eq!(stub.calls(), before);
}

#[test]
fn test_unsupported_commands_fail_without_io() {
    let stub = StubChannel::default();
    let driver = driver(&stub, DriverConfig::default());
    let before = stub.calls();

    assert!(matches!(
        driver.exec_queue(),
        Err(DobotError::Unsupported(Command::ExecQueue))
    ));
    assert!(matches!(
        driver.switch_to_accel_report_mode(),
        Err(DobotError::Unsupported(Command::SwitchToAccelReportMode))
    ));
    assert_eq!(stub.calls(), before);
}

#[test]
fn test_stale_bytes_are_flushed_before_read() {
    let stub = StubChannel::replying(vec![Some(reply(&[0x00], &[0x40]))]);
    let driver = driver(&stub, DriverConfig::default());
    stub.wire.lock().unwrap().rx.extend([0xAA, 0xBB, 0xCC]);

    assert_eq!(driver.ready().unwrap(), 0x40);
}

#[test]
fn test_resync_drains_and_recovers() {
    let stub = StubChannel::replying(vec![Some(reply(&[0x00], &[0x40]))]);
    let driver = driver(&stub, DriverConfig::default());
    stub.wire.lock().unwrap().rx.extend([0x01, 0x02]);

    driver.resync().unwrap();
    assert!(stub.wire.lock().unwrap().rx.is_empty());
    assert_eq!(driver.ready().unwrap(), 0x40);
}

#[test]
fn test_concurrent_callers_are_serialized() {
    let callers = 8;
    let replies = (0..callers)
        .map(|_| Some(reply(&[0x00], &[0x40])))
        .collect();
    let stub = StubChannel::replying(replies);
    let driver = Arc::new(driver(&stub, DriverConfig::default()));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let driver = Arc::clone(&driver);
            thread::spawn(move || driver.ready())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 0x40);
    }
    assert_eq!(stub.writes().len(), callers);
}

#[test]
fn test_into_channel_returns_link() {
    let stub = StubChannel::default();
    let channel = driver(&stub, DriverConfig::default()).into_channel();
    assert!(Arc::ptr_eq(&channel.wire, &stub.wire));
}

#[test]
fn test_boxed_channel() {
    let stub = StubChannel::replying(vec![Some(reply(&[0x00], &[0x40]))]);
    let boxed: Box<dyn ByteChannel + Send> = Box::new(stub.clone());
    let driver = create_driver(boxed, DriverConfig::default().with_boot_delay(Duration::ZERO)).boot();

    assert_eq!(driver.ready().unwrap(), 0x40);
}
