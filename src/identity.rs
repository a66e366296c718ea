//! Persisted node identity (NVRAM), abstracted behind a small storage
//! trait rather than a raw pointer cast into flash, the same way the radio
//! and timer are abstracted behind traits instead of talking to registers
//! directly.

/// Sentinel meaning "no short address has been persisted yet".
pub const ADDR_UNASSIGNED: u32 = 0xFFFF_FFFF;

/// The fields persisted to NVRAM: a 4-byte short address (sentinel
/// `ADDR_UNASSIGNED`), a 4-byte PAN id, and the 8-byte EUI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistedIdentity {
    pub short_addr: u32,
    pub pan_id: u32,
    pub eui: u64,
}

impl PersistedIdentity {
    pub fn unassigned(eui: u64) -> Self {
        Self { short_addr: ADDR_UNASSIGNED, pan_id: ADDR_UNASSIGNED, eui }
    }

    pub fn is_assigned(&self) -> bool {
        self.short_addr != ADDR_UNASSIGNED && self.pan_id != ADDR_UNASSIGNED
    }
}

/// Backing store for [`PersistedIdentity`], implemented by the embedder
/// against whatever flash/NVRAM driver is available.
pub trait IdentityStore {
    type Error;

    fn load_identity(&mut self) -> Result<PersistedIdentity, Self::Error>;

    fn store_identity(&mut self, identity: &PersistedIdentity) -> Result<(), Self::Error>;
}

#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    use super::*;

    /// In-memory identity store for tests and host simulation.
    #[derive(Clone, Debug, Default)]
    pub struct MemoryIdentityStore(pub Option<PersistedIdentity>);

    impl IdentityStore for MemoryIdentityStore {
        type Error = ();

        fn load_identity(&mut self) -> Result<PersistedIdentity, Self::Error> {
            self.0.ok_or(())
        }

        fn store_identity(&mut self, identity: &PersistedIdentity) -> Result<(), Self::Error> {
            self.0 = Some(*identity);
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::mock::MemoryIdentityStore;
    use super::*;

    #[test]
    fn round_trips_through_store() {
        let mut store = MemoryIdentityStore::default();
        assert!(store.load_identity().is_err());

        let id = PersistedIdentity { short_addr: 42, pan_id: 0x4742, eui: 0xdead_beef_cafe_f00d };
        store.store_identity(&id).unwrap();

        assert_eq!(store.load_identity().unwrap(), id);
    }
}
