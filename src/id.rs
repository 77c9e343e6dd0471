use chrono::Utc;
use uuid::{Builder, Uuid};

use crate::error::{MigrateError, Result};

/// Mints UUIDv7 identifiers that sort in the order they were issued.
///
/// Layout: 48-bit unix milliseconds, 12-bit per-millisecond counter, 62 random bits.
/// The counter keeps ordering strict when several ids share a millisecond, and a
/// clock that stalls or steps backwards never produces an id below the last one.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: Option<u64>,
    counter: u16,
}

impl IdGenerator {
    const MAX_COUNTER: u16 = 0x0fff;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> Result<Uuid> {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.next_id_with(now, |bytes| {
            getrandom::fill(bytes).map_err(|err| MigrateError::IdGeneration(err.to_string()))
        })
    }

    /// Test hook: inject the clock reading and random bytes.
    pub(crate) fn next_id_with<F>(&mut self, now_millis: u64, mut fill_random: F) -> Result<Uuid>
    where
        F: FnMut(&mut [u8]) -> Result<()>,
    {
        let (millis, counter) = self.advance(now_millis);

        let mut bytes = [0_u8; 10];
        fill_random(&mut bytes[2..])?;
        // The builder overwrites the top nibble of byte 0 with the version.
        bytes[0] = ((counter >> 8) & 0x0f) as u8;
        bytes[1] = (counter & 0xff) as u8;

        Ok(Builder::from_unix_timestamp_millis(millis, &bytes).into_uuid())
    }

    fn advance(&mut self, now_millis: u64) -> (u64, u16) {
        match self.last_millis {
            Some(last) if now_millis <= last => {
                if self.counter < Self::MAX_COUNTER {
                    self.counter += 1;
                } else {
                    self.last_millis = Some(last + 1);
                    self.counter = 0;
                }
            }
            _ => {
                self.last_millis = Some(now_millis);
                self.counter = 0;
            }
        }

        (self.last_millis.unwrap_or(now_millis), self.counter)
    }
}
