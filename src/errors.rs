use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SimulatorError {
    // Trace input errors
    TraceOpen(io::Error),
    TraceRead(io::Error),
    MalformedRecord { line: String, separators: usize },

    // Output errors
    StatsExport(io::Error),
}

impl SimulatorError {
    /// Process exit code reported for this error.
    ///
    /// Trace-open failures exit with 1, malformed trace lines with 2. Both
    /// codes are part of the simulator's external contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimulatorError::TraceOpen(_) => 1,
            SimulatorError::MalformedRecord { .. } => 2,
            SimulatorError::TraceRead(_) | SimulatorError::StatsExport(_) => 1,
        }
    }
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::TraceOpen(_) => {
                write!(f, "Could not open file.")
            },
            SimulatorError::TraceRead(err) => write!(f, "Error reading trace: {}", err),
            SimulatorError::MalformedRecord { line, separators } => {
                write!(
                    f,
                    "Error reading trace (Wrong number of fields: {} separators)\n{}",
                    separators, line
                )
            },
            SimulatorError::StatsExport(err) => {
                write!(f, "Could not export statistics: {}", err)
            },
        }
    }
}

impl Error for SimulatorError {}

impl From<io::Error> for SimulatorError {
    fn from(error: io::Error) -> Self {
        SimulatorError::TraceRead(error)
    }
}
