//! Controller status codes.
//!
//! Every FireStep response carries an integer status `s`. The table below
//! maps those integers to symbolic names for log messages. Control flow
//! only looks at the [`StatusClass`]: zero is done, positive codes mean the
//! command was accepted and is still running, negative codes are rejections.

use std::fmt;

use crate::error::DriverError;

/// Broad meaning of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// Command completed.
    Done,
    /// Command accepted; the controller is still working on it.
    Busy,
    /// Controller is waiting on an external condition.
    Waiting,
    /// Command rejected or failed.
    Error,
}

impl StatusClass {
    /// Classify a raw status integer, known or not.
    pub fn of(code: i32) -> Self {
        match code {
            0 => Self::Done,
            1..=9 => Self::Busy,
            c if c > 9 => Self::Waiting,
            _ => Self::Error,
        }
    }

    /// `true` when the command still needs a completion signal.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Busy | Self::Waiting)
    }
}

macro_rules! status_codes {
    ($( $variant:ident = $code:literal => $name:literal, )*) => {
        /// Known controller status codes.
        #[repr(i32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            $( $variant = $code, )*
        }

        impl StatusCode {
            /// Every known code, in table order.
            pub const ALL: &'static [StatusCode] = &[ $( StatusCode::$variant, )* ];

            /// Symbolic firmware name, e.g. `STATUS_BUSY_MOVING`.
            pub const fn name(self) -> &'static str {
                match self {
                    $( StatusCode::$variant => $name, )*
                }
            }

            /// Look a raw integer up in the table.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $( $code => Some(StatusCode::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    // ── Done ─────────────────────────────────────────────────────
    Ok = 0 => "STATUS_OK",

    // ── Busy (1..=9) ─────────────────────────────────────────────
    BusyParsed = 1 => "STATUS_BUSY_PARSED",
    Busy = 2 => "STATUS_BUSY",
    BusyMoving = 3 => "STATUS_BUSY_MOVING",
    BusySetup = 4 => "STATUS_BUSY_SETUP",
    BusyOk = 5 => "STATUS_BUSY_OK",
    BusyCalibrating = 6 => "STATUS_BUSY_CALIBRATING",
    BusyEeprom = 7 => "STATUS_BUSY_EEPROM",

    // ── Waiting (10..) ───────────────────────────────────────────
    WaitIdle = 10 => "STATUS_WAIT_IDLE",
    WaitEol = 11 => "STATUS_WAIT_EOL",
    WaitCamera = 12 => "STATUS_WAIT_CAMERA",
    WaitOperator = 13 => "STATUS_WAIT_OPERATOR",
    WaitMoving = 14 => "STATUS_WAIT_MOVING",
    WaitBusy = 15 => "STATUS_WAIT_BUSY",
    WaitCancelled = 16 => "STATUS_WAIT_CANCELLED",

    // ── Motion and axis errors (-1..=-99) ────────────────────────
    Empty = -1 => "STATUS_EMPTY",
    PositionError = -2 => "STATUS_POSITION_ERROR",
    AxisError = -3 => "STATUS_AXIS_ERROR",
    SysError = -4 => "STATUS_SYS_ERROR",
    S1RangeError = -5 => "STATUS_S1_RANGE_ERROR",
    S2RangeError = -6 => "STATUS_S2_RANGE_ERROR",
    S3RangeError = -7 => "STATUS_S3_RANGE_ERROR",
    S4RangeError = -8 => "STATUS_S4_RANGE_ERROR",
    SeroutEolWait = -9 => "STATUS_SEROUT_EOL_WAIT",
    AxisDisabled = -10 => "STATUS_AXIS_DISABLED",
    NoPin = -11 => "STATUS_NOPIN",
    Estop = -12 => "STATUS_ESTOP",
    Slack = -13 => "STATUS_SLACK",
    MotorIndex = -14 => "STATUS_MOTOR_INDEX",
    StepRangeError = -15 => "STATUS_STEP_RANGE_ERROR",
    StrokeSegpulses = -16 => "STATUS_STROKE_SEGPULSES",
    StrokeMaxlen = -17 => "STATUS_STROKE_MAXLEN",
    StrokeEndError = -18 => "STATUS_STROKE_END_ERROR",
    StrokeStart = -19 => "STATUS_STROKE_START",
    StrokeNullError = -20 => "STATUS_STROKE_NULL_ERROR",
    StrokeTime = -21 => "STATUS_STROKE_TIME",
    StrokePlanmicros = -22 => "STATUS_STROKE_PLANMICROS",
    LinearMaxlen = -23 => "STATUS_LINEAR_MAXLEN",
    LinearSegpulses = -24 => "STATUS_LINEAR_SEGPULSES",
    MotorError = -25 => "STATUS_MOTOR_ERROR",
    TravelMin = -26 => "STATUS_TRAVEL_MIN",
    TravelMax = -27 => "STATUS_TRAVEL_MAX",
    LimitMin = -28 => "STATUS_LIMIT_MIN",
    LimitMax = -29 => "STATUS_LIMIT_MAX",
    HomingFailed = -30 => "STATUS_HOMING_FAILED",
    ProbeFailed = -31 => "STATUS_PROBE_FAILED",
    ProbePin = -32 => "STATUS_PROBE_PIN",
    ZeroLengthMove = -33 => "STATUS_ZERO_LENGTH_MOVE",
    CalibrateSteps = -34 => "STATUS_CALIBRATE_STEPS",
    CalibrateLimit = -35 => "STATUS_CALIBRATE_LIMIT",
    KinematicXyzErr = -36 => "STATUS_KINEMATIC_XYZ",
    KinematicRange = -37 => "STATUS_KINEMATIC_RANGE",
    DeltaHome = -38 => "STATUS_DELTA_HOME",
    MoveStepsError = -39 => "STATUS_MOVE_STEPS_ERROR",
    MpoPlanError = -40 => "STATUS_MPO_PLAN",
    WaitError = -41 => "STATUS_WAIT_ERROR",
    WaitTimeout = -42 => "STATUS_WAIT_TIMEOUT",

    // ── Hardware, pins and I/O (-100..=-199) ─────────────────────
    PinConfig = -100 => "STATUS_PIN_CONFIG",
    PinNotOutput = -101 => "STATUS_PIN_NOT_OUTPUT",
    PinNotInput = -102 => "STATUS_PIN_NOT_INPUT",
    PinReserved = -103 => "STATUS_PIN_RESERVED",
    IoNotSupported = -104 => "STATUS_IO_NOT_SUPPORTED",
    IoRange = -105 => "STATUS_IO_RANGE",
    SerialOverflow = -110 => "STATUS_SERIAL_OVERFLOW",
    SerialFraming = -111 => "STATUS_SERIAL_FRAMING",
    SerialTimeout = -112 => "STATUS_SERIAL_TIMEOUT",
    SerialCancelled = -113 => "STATUS_SERIAL_CANCELLED",
    EepromAddress = -120 => "STATUS_EEPROM_ADDR",
    EepromJsonSave = -121 => "STATUS_EEPROM_JSON_SAVE",
    EepromRead = -122 => "STATUS_EEPROM_READ",
    EepromWrite = -123 => "STATUS_EEPROM_WRITE",
    PowerLow = -130 => "STATUS_POWER_LOW",
    PowerOff = -131 => "STATUS_POWER_OFF",
    DriverFault = -132 => "STATUS_DRIVER_FAULT",
    Overheat = -133 => "STATUS_OVERHEAT",

    // ── JSON protocol (-400..=-499) ──────────────────────────────
    JsonBraceError = -400 => "STATUS_JSON_BRACE_ERROR",
    JsonBracketError = -401 => "STATUS_JSON_BRACKET_ERROR",
    UnrecognizedName = -402 => "STATUS_UNRECOGNIZED_NAME",
    JsonParseError = -403 => "STATUS_JSON_PARSE_ERROR",
    JsonTooLong = -404 => "STATUS_JSON_TOO_LONG",
    JsonObject = -405 => "STATUS_JSON_OBJECT",
    JsonPositive = -406 => "STATUS_JSON_POSITIVE",
    JsonPositive1 = -407 => "STATUS_JSON_POSITIVE1",
    JsonKey = -408 => "STATUS_JSON_KEY",
    JsonStrokeError = -409 => "STATUS_JSON_STROKE_ERROR",
    RangeError = -410 => "STATUS_RANGE_ERROR",
    S1S2LenError = -411 => "STATUS_S1S2LEN_ERROR",
    S1S3LenError = -412 => "STATUS_S1S3LEN_ERROR",
    S1S4LenError = -413 => "STATUS_S1S4LEN_ERROR",
    FieldError = -414 => "STATUS_FIELD_ERROR",
    FieldRangeError = -415 => "STATUS_FIELD_RANGE_ERROR",
    FieldArrayError = -416 => "STATUS_FIELD_ARRAY_ERROR",
    FieldRequired = -417 => "STATUS_FIELD_REQUIRED",
    JsonArrayLen = -418 => "STATUS_JSON_ARRAY_LEN",
    OutputField = -419 => "STATUS_OUTPUT_FIELD",
    FieldHexError = -420 => "STATUS_FIELD_HEX_ERROR",
    JsonCmd = -421 => "STATUS_JSON_CMD",
    JsonString = -422 => "STATUS_JSON_STRING",
    JsonBool = -423 => "STATUS_JSON_BOOL",
    Json255 = -424 => "STATUS_JSON_255",
    JsonMem = -425 => "STATUS_JSON_MEM",
    JsonDigit = -426 => "STATUS_JSON_DIGIT",
    JsonNumber = -427 => "STATUS_JSON_NUMBER",
    JsonArray = -428 => "STATUS_JSON_ARRAY",
    JsonNull = -429 => "STATUS_JSON_NULL",
    JsonMotorIndex = -430 => "STATUS_JSON_MOTOR_INDEX",
    JsonAxisIndex = -431 => "STATUS_JSON_AXIS_INDEX",
    JsonNotImplemented = -432 => "STATUS_JSON_NOT_IMPLEMENTED",
    JsonReadOnly = -433 => "STATUS_JSON_READ_ONLY",
    JsonDuplicateKey = -434 => "STATUS_JSON_DUPLICATE_KEY",
    JsonOverflow = -435 => "STATUS_JSON_OVERFLOW",
    JsonUnderflow = -436 => "STATUS_JSON_UNDERFLOW",
    JsonNesting = -437 => "STATUS_JSON_NESTING",
    JsonEscape = -438 => "STATUS_JSON_ESCAPE",
    JsonUnicode = -439 => "STATUS_JSON_UNICODE",

    // ── Program/state errors (-900..) ────────────────────────────
    StateError = -900 => "STATUS_STATE",
    NotImplemented = -901 => "STATUS_NOT_IMPLEMENTED",
    Truncated = -902 => "STATUS_TRUNCATED",
    NoMotor = -903 => "STATUS_NO_MOTOR",
    MachineBusy = -904 => "STATUS_MACHINE_BUSY",
}

impl StatusCode {
    /// Raw integer value as sent by the controller.
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn class(self) -> StatusClass {
        StatusClass::of(self.code())
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = DriverError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or(DriverError::UnknownVariant {
            type_name: "StatusCode",
            value: i64::from(value),
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Name for any integer, falling back to `STATUS_UNKNOWN`.
pub fn status_name(code: i32) -> &'static str {
    StatusCode::from_code(code).map_or("STATUS_UNKNOWN", StatusCode::name)
}
