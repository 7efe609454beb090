use core::cell::RefCell;

use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, ErrorType, I2c, Operation},
};
use embedded_hal_bus::i2c::RefCellDevice;
use embedded_hal_mock::eh1::{
    delay::NoopDelay,
    i2c::{Mock as I2cMock, Transaction as I2cTrans},
};
use fwb_core::utils::{
    controllers::{DeviceError, MotorBoard, Register, Wheel, MOTOR_BOARD_ADDRESS},
    math::actuation::ActuationCommand,
    MotorConfig,
};

/// Create a register write transaction (`[reg, payload...]`).
pub fn write(
    reg: u8,
    data: Vec<u8>,
) -> I2cTrans {
    let mut frame = vec![reg];
    frame.extend(data);
    I2cTrans::write(MOTOR_BOARD_ADDRESS, frame)
}
/// Create a register read transaction returning `data`.
pub fn write_read(
    reg: u8,
    data: Vec<u8>,
) -> I2cTrans {
    I2cTrans::write_read(MOTOR_BOARD_ADDRESS, vec![reg], data)
}

/// What reached the bus or the delay, in order.
#[derive(Debug, PartialEq)]
enum Event {
    Write(u8),
    WaitMs(u32),
}

/// Bus wrapper that records the register of every write before forwarding it.
struct TracedBus<'a> {
    inner: I2cMock,
    events: &'a RefCell<Vec<Event>>,
}

impl ErrorType for TracedBus<'_> {
    type Error = ErrorKind;
}

impl I2c for TracedBus<'_> {
    fn write(
        &mut self,
        address: u8,
        bytes: &[u8],
    ) -> Result<(), Self::Error> {
        self.events.borrow_mut().push(Event::Write(bytes[0]));
        self.inner.write(address, bytes)
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.inner.transaction(address, operations)
    }
}

/// Delay that records each millisecond wait into the same event list.
struct TracedDelay<'a>(&'a RefCell<Vec<Event>>);

impl DelayNs for TracedDelay<'_> {
    fn delay_ns(
        &mut self,
        _ns: u32,
    ) {
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.0.borrow_mut().push(Event::WaitMs(ms));
    }
}

#[test]
fn test_configure_motor() {
    let expectations = [
        write(0x01, vec![3]),
        write(0x04, vec![0x00, 45]),
        write(0x03, vec![0x00, 13]),
        write(0x05, vec![0x00, 0x00, 0x82, 0x42]),
        write(0x02, vec![0x04, 0xE2]),
    ];

    let mut mock = I2cMock::new(&expectations);
    let events = RefCell::new(Vec::new());
    let mut board = MotorBoard::with_bus(TracedBus {
        inner: mock.clone(),
        events: &events,
    });
    board
        .configure(&MotorConfig::default(), &mut TracedDelay(&events))
        .unwrap();
    mock.done();

    // Each register gets 50 ms to settle before the next one is written.
    assert_eq!(
        events.into_inner(),
        vec![
            Event::Write(0x01),
            Event::WaitMs(50),
            Event::Write(0x04),
            Event::WaitMs(50),
            Event::Write(0x03),
            Event::WaitMs(50),
            Event::Write(0x05),
            Event::WaitMs(50),
            Event::Write(0x02),
            Event::WaitMs(50),
        ]
    );
}

#[test]
fn test_configure_stops_at_first_bus_error() {
    let expectations = [
        write(0x01, vec![3]),
        write(0x04, vec![0x00, 45]).with_error(ErrorKind::NoAcknowledge(
            embedded_hal::i2c::NoAcknowledgeSource::Address,
        )),
    ];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    assert!(matches!(
        board.configure(&MotorConfig::default(), &mut NoopDelay::new()),
        Err(DeviceError::Bus(ErrorKind::NoAcknowledge(_)))
    ));
    mock.done();
}

#[test]
fn test_read_encoder_deltas() {
    let expectations = [
        write_read(0x10, vec![0x04, 0x92]),
        write_read(0x11, vec![0xFB, 0x6E]),
        write_read(0x12, vec![0x00, 0x00]),
        write_read(0x13, vec![0xFF, 0xFF]),
    ];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    assert_eq!(board.read_encoder_deltas().unwrap(), [1170, -1170, 0, -1]);
    mock.done();
}

#[test]
fn test_read_total_encoder_counts() {
    let expectations = [
        write_read(0x20, vec![0x00, 0x00]),
        write_read(0x21, vec![0x00, 0x2A]),
        write_read(0x22, vec![0x00, 0x01]),
        write_read(0x23, vec![0x00, 0x00]),
        write_read(0x24, vec![0xFF, 0xFF]),
        write_read(0x25, vec![0xFF, 0xFE]),
        write_read(0x26, vec![0x80, 0x00]),
        write_read(0x27, vec![0x00, 0x00]),
    ];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    assert_eq!(
        board.read_total_encoder_counts().unwrap(),
        [42, 65536, -2, i32::MIN]
    );
    mock.done();
}

#[test]
fn test_pwm_write_is_one_eight_byte_frame() {
    let expectations = [write(
        0x07,
        vec![0xFC, 0x18, 0x03, 0xE8, 0x00, 0x00, 0x07, 0xD0],
    )];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    board.control_motor_pwm([-1000, 1000, 0, 2000]).unwrap();
    mock.done();
}

#[test]
fn test_pwm_write_clamps_to_board_range() {
    let expectations = [write(
        0x07,
        vec![0x07, 0xD0, 0xF8, 0x30, 0x07, 0xD0, 0x00, 0x01],
    )];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    board.control_motor_pwm([5000, -5000, i16::MAX, 1]).unwrap();
    mock.done();
}

#[test]
fn test_voltage_write_keeps_direction() {
    // 7.34 V -> 2000, -8.5 V saturates to -2000, 0 V -> 0, negative zero stays 0.
    let expectations = [write(
        0x07,
        vec![0x07, 0xD0, 0xF8, 0x30, 0x00, 0x00, 0x00, 0x00],
    )];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    board.control_motor_voltage([7.34, -8.5, 0.0, -0.0]).unwrap();
    mock.done();
}

#[test]
fn test_stop_all_is_idempotent() {
    let zero = write(0x07, vec![0; 8]);
    let expectations = [zero.clone(), zero.clone(), zero];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    board.stop_all().unwrap();
    board.stop_all().unwrap();
    board.apply(&ActuationCommand::broadcast(-0.0)).unwrap();
    mock.done();
}

#[test]
fn test_unbound_board_fails_without_traffic() {
    let mut board: MotorBoard<I2cMock> = MotorBoard::new();
    assert!(matches!(
        board.read_encoder_deltas(),
        Err(DeviceError::NotInitialized)
    ));
    assert!(matches!(board.stop_all(), Err(DeviceError::NotInitialized)));
    assert!(!board.is_bound());
}

#[test]
fn test_bind_then_use() {
    let expectations = [write_read(0x10, vec![0x00, 0x05])];
    let mut mock = I2cMock::new(&expectations);

    let mut board = MotorBoard::new();
    board.bind(mock.clone());
    let buf = board.read_register::<2>(Register::EncoderDelta(Wheel::W1)).unwrap();
    assert_eq!(buf, [0x00, 0x05]);
    assert!(board.release().is_some());
    mock.done();
}

#[test]
fn test_wrong_width_is_rejected_before_the_bus() {
    let expectations: [I2cTrans; 0] = [];
    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());

    let err = board.write_register(Register::Pwm, &[0; 4]).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::RegisterWidth {
            register: Register::Pwm,
            expected: 8,
            actual: 4
        }
    ));
    assert!(board.read_register::<4>(Register::EncoderDelta(Wheel::W2)).is_err());
    mock.done();
}

#[test]
fn test_bus_error_propagates_unmodified() {
    let expectations = [
        write_read(0x10, vec![0x00, 0x00]),
        write_read(0x11, vec![0x00, 0x00]).with_error(ErrorKind::Other),
    ];

    let mut mock = I2cMock::new(&expectations);
    let mut board = MotorBoard::with_bus(mock.clone());
    assert!(matches!(
        board.read_encoder_deltas(),
        Err(DeviceError::Bus(ErrorKind::Other))
    ));
    mock.done();
}

/// The board also works over a shared bus handle.
#[test]
fn test_shared_bus_device() {
    let expectations = [write(0x07, vec![0; 8]), write_read(0x13, vec![0x00, 0x10])];
    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);

    let mut board = MotorBoard::with_bus(RefCellDevice::new(&i2c_bus));
    board.stop_all().unwrap();
    let buf = board.read_register::<2>(Register::EncoderDelta(Wheel::W4)).unwrap();
    assert_eq!(buf, [0x00, 0x10]);
    i2c_bus.borrow_mut().done();
}
