use crate::mac_address::MacAddress;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A stable device address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0x80, 0x6F, 0xB0, 0x12, 0x34, 0x56]);

/// A version 1 record as it appears on the wire.
pub const SAMPLE_BYTES: [u8; 20] = [
    0x01, // version
    0x64, // humidity: 100 / 2 = 50.0 %rH
    0x00, // light
    0x00, // accel
    0x32, 0x00, // radon short term: 50 Bq/m3
    0x3C, 0x00, // radon long term: 60 Bq/m3
    0x98, 0x08, // temperature: 2200 / 100 = 22.0 C
    0xF5, 0x03, // pressure: 1013 / 50 = 20.26 hPa
    0x90, 0x01, // CO2: 400 ppm
    0xFA, 0x00, // VOC: 250 ppb
    0x00, 0x00, // unused
    0x00, 0x00, // unused
];

/// [`SAMPLE_BYTES`] unpacked into integer fields.
pub const SAMPLE_FIELDS: [u16; 12] = [1, 100, 0, 0, 50, 60, 2200, 1013, 400, 250, 0, 0];

/// In-memory log sink for asserting on emitted events.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Run `f` with a WARN-level subscriber writing into this buffer.
    pub fn capture_warnings<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
