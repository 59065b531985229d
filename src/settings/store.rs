//! Byte-addressable persistent store seam (§4.11).
//!
//! Grounded on `drivers/mb85_fram.h`. The source links a RAM mirror to a
//! remote FRAM region and loads/saves through that link; Rust's ownership
//! model makes the link step unnecessary, so this trait collapses it to a
//! plain addressed read/write that the settings module calls directly.

/// A byte-addressable persistent store (e.g. an FRAM over I2C).
pub trait PersistentStore {
    type Error;

    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, addr: u16, buf: &[u8]) -> Result<(), Self::Error>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::PersistentStore;

    /// An in-memory store for tests, sized to exactly the 10 blocks a real
    /// layout would hold (active + nine profile slots), so an addressing
    /// bug that walks past profile 9 fails loudly instead of landing in
    /// slack space.
    const NUM_BLOCKS: usize = 10;

    pub struct FakeStore {
        pub bytes: [u8; super::super::profile::BLOCK_SIZE * NUM_BLOCKS],
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self { bytes: [0; super::super::profile::BLOCK_SIZE * NUM_BLOCKS] }
        }
    }

    impl PersistentStore for FakeStore {
        type Error = ();

        fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
            let addr = addr as usize;
            if addr + buf.len() > self.bytes.len() {
                return Err(());
            }
            buf.copy_from_slice(&self.bytes[addr..addr + buf.len()]);
            Ok(())
        }

        fn write(&mut self, addr: u16, buf: &[u8]) -> Result<(), Self::Error> {
            let addr = addr as usize;
            if addr + buf.len() > self.bytes.len() {
                return Err(());
            }
            self.bytes[addr..addr + buf.len()].copy_from_slice(buf);
            Ok(())
        }
    }
}
