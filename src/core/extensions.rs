//! String and timestamp helpers built on the typed primitives
//!
//! Strings are stored as NUL-terminated runs of `char` code units.
//! Timestamps are stored as a signed count of 100 ns ticks since
//! 0001-01-01T00:00:00.

use crate::codec::Primitive;
use crate::error::{HeapError, Result};
use crate::handle::Handle;
use crate::heap::HeapFile;
use chrono::{Duration, NaiveDate, NaiveDateTime};

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Extra codecs for [`HeapFile`]
pub trait HeapFileExt {
    /// Allocate room for `value` plus its terminator
    fn allocate_string(&mut self, value: &str, id: i64) -> Result<Handle>;

    /// Write `value` followed by a NUL terminator
    fn write_string(&mut self, handle: &Handle, value: &str) -> Result<()>;

    /// Read code units up to the first NUL or the end of the handle
    fn read_string(&mut self, handle: &Handle) -> Result<String>;

    /// Allocate room for one timestamp
    fn allocate_timestamp(&mut self, id: i64) -> Result<Handle>;

    fn write_timestamp(&mut self, handle: &Handle, value: NaiveDateTime) -> Result<()>;

    fn read_timestamp(&mut self, handle: &Handle) -> Result<NaiveDateTime>;
}

impl HeapFileExt for HeapFile {
    fn allocate_string(&mut self, value: &str, id: i64) -> Result<Handle> {
        self.allocate_array::<char>(value.chars().count() + 1, id)
    }

    fn write_string(&mut self, handle: &Handle, value: &str) -> Result<()> {
        if value.contains('\0') {
            return Err(HeapError::InvalidValue(
                "string contains an interior NUL".to_string(),
            ));
        }

        let mut units: Vec<char> = value.chars().collect();
        units.push('\0');

        let needed = (units.len() * char::WIDTH) as i64;
        if needed > handle.size() {
            return Err(HeapError::OversizedValue {
                size: needed,
                capacity: handle.size(),
            });
        }

        self.write_array(handle, &units)
    }

    fn read_string(&mut self, handle: &Handle) -> Result<String> {
        let capacity = handle.size() as usize / char::WIDTH;
        let mut text = String::new();

        for i in 0..capacity {
            let unit = self.pointer_offset(handle, (i * char::WIDTH) as i64)?;
            match self.read::<char>(&unit)? {
                '\0' => break,
                c => text.push(c),
            }
        }

        Ok(text)
    }

    fn allocate_timestamp(&mut self, id: i64) -> Result<Handle> {
        self.allocate_typed::<i64>(id)
    }

    fn write_timestamp(&mut self, handle: &Handle, value: NaiveDateTime) -> Result<()> {
        self.write(handle, to_ticks(value)?)
    }

    fn read_timestamp(&mut self, handle: &Handle) -> Result<NaiveDateTime> {
        let ticks = self.read::<i64>(handle)?;
        from_ticks(ticks)
    }
}

fn tick_epoch() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| HeapError::InvalidValue("tick epoch out of range".to_string()))
}

fn to_ticks(value: NaiveDateTime) -> Result<i64> {
    let elapsed = value - tick_epoch()?;
    let seconds = elapsed.num_seconds();
    let nanos = (elapsed - Duration::seconds(seconds))
        .num_nanoseconds()
        .unwrap_or(0);

    seconds
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|ticks| ticks.checked_add(nanos / NANOS_PER_TICK))
        .ok_or_else(|| HeapError::InvalidValue(format!("{} is out of tick range", value)))
}

fn from_ticks(ticks: i64) -> Result<NaiveDateTime> {
    let seconds = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;

    tick_epoch()?
        .checked_add_signed(Duration::seconds(seconds))
        .and_then(|t| t.checked_add_signed(Duration::nanoseconds(nanos)))
        .ok_or_else(|| HeapError::InvalidValue(format!("{} ticks is out of range", ticks)))
}
