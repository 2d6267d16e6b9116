// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// reader.rs
//
// This file contains the trace file reader shared by both simulators.
// Traces are plain text, one record per line, with fields separated by
// semicolons. The reader opens the file once and yields one typed record
// per call until end of file.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;

use log::info;

use crate::errors::SimulatorError;

/// Opcode prefix that marks a record as a branch instruction.
pub const BRANCH_OPCODE_PREFIX: &str = "OP_BRANCH";

/// One line of a trace file, parsed from its `;`-separated fields.
pub trait TraceRecord: Sized {
    /// Number of `;` separators a well-formed line must contain.
    const SEPARATORS: usize;

    /// Build a record from the split fields. The caller guarantees
    /// `fields.len() == SEPARATORS + 1`.
    fn from_fields(fields: &[&str]) -> Self;
}

// Numeric trace fields parse like strtoul: surrounding whitespace is
// ignored and the longest run of leading base-10 digits counts; whatever
// follows it is dropped. A field with no leading digits reads as zero, which
// downstream code treats the same way as an absent register slot.
fn parse_field(field: &str) -> u64 {
    let field = field.trim();
    let digits = field.bytes().take_while(u8::is_ascii_digit).count();
    field[..digits].parse().unwrap_or(0)
}

/// A record of the branch trace: `asm;opcode;address;size;C|I`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRecord {
    pub assembly: String,
    pub opcode: String,
    pub address: u64,
    pub size: u64,
    pub is_conditional: bool,
}

impl BranchRecord {
    /// Whether this record is a branch instruction at all.
    pub fn is_branch(&self) -> bool {
        self.opcode.starts_with(BRANCH_OPCODE_PREFIX)
    }

    /// Address of the next sequential instruction.
    pub fn fall_through(&self) -> u64 {
        self.address.wrapping_add(self.size)
    }
}

impl TraceRecord for BranchRecord {
    const SEPARATORS: usize = 4;

    fn from_fields(fields: &[&str]) -> Self {
        Self {
            assembly: fields[0].to_string(),
            opcode: fields[1].to_string(),
            address: parse_field(fields[2]),
            size: parse_field(fields[3]),
            is_conditional: fields[4].starts_with('C'),
        }
    }
}

impl fmt::Display for BranchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " Asm:{} Opcode:{} Address:{} Size:{} Cond?:{}",
            self.assembly,
            self.opcode,
            self.address,
            self.size,
            if self.is_conditional { "C" } else { "I" }
        )
    }
}

/// A record of the memory trace: `asm;address;opcode;read1;read2;write`.
///
/// `address` is the instruction PC; the three register slots hold data
/// addresses, with zero meaning "no access".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub assembly: String,
    pub address: u64,
    pub opcode: String,
    pub read1: u64,
    pub read2: u64,
    pub write: u64,
}

impl TraceRecord for MemoryRecord {
    const SEPARATORS: usize = 5;

    fn from_fields(fields: &[&str]) -> Self {
        Self {
            assembly: fields[0].to_string(),
            address: parse_field(fields[1]),
            opcode: fields[2].to_string(),
            read1: parse_field(fields[3]),
            read2: parse_field(fields[4]),
            write: parse_field(fields[5]),
        }
    }
}

impl fmt::Display for MemoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " Asm:{} Opcode:{} Address:{} First read register:{} Second read register:{} Write register:{}",
            self.assembly, self.opcode, self.address, self.read1, self.read2, self.write
        )
    }
}

/// Lazy, non-restartable reader over one trace file.
///
/// The file handle is owned by the reader and held open until the reader is
/// dropped at the end of the run.
pub struct TraceReader<R> {
    reader: BufReader<File>,
    line: String,
    records_read: u64,
    _record: PhantomData<R>,
}

impl<R: TraceRecord> TraceReader<R> {
    /// Open the named trace file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SimulatorError> {
        let file = File::open(path.as_ref()).map_err(SimulatorError::TraceOpen)?;
        info!("Opened trace file {}", path.as_ref().display());

        Ok(Self {
            reader: BufReader::new(file),
            line: String::new(),
            records_read: 0,
            _record: PhantomData,
        })
    }

    /// Read the next record, or `None` at end of trace.
    ///
    /// A line with the wrong number of `;` separators is fatal; the caller
    /// exits with the malformed-record status code.
    pub fn next_record(&mut self) -> Result<Option<R>, SimulatorError> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            info!("End of trace after {} records", self.records_read);
            return Ok(None);
        }

        let line = self.line.trim_end_matches(&['\n', '\r'][..]);
        let separators = line.matches(';').count();
        if separators != R::SEPARATORS {
            return Err(SimulatorError::MalformedRecord {
                line: line.to_string(),
                separators,
            });
        }

        let fields: Vec<&str> = line.split(';').collect();
        self.records_read += 1;
        Ok(Some(R::from_fields(&fields)))
    }

    /// Number of records successfully read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fields_parse_the_leading_digit_run() {
        assert_eq!(parse_field("123"), 123);
        assert_eq!(parse_field(" 123 "), 123);
        assert_eq!(parse_field("123abc"), 123);
        assert_eq!(parse_field("0x1F"), 0, "hex prefixes are not base-10");
        assert_eq!(parse_field("abc"), 0);
        assert_eq!(parse_field(""), 0);
    }

    #[test]
    fn branch_record_takes_digit_prefixes() {
        let fields = ["jnz label", "OP_BRANCH_CC", "100(r2)", "4", "C"];
        let record = BranchRecord::from_fields(&fields);
        assert_eq!(record.address, 100);
        assert_eq!(record.size, 4);
        assert!(record.is_conditional);
    }
}
