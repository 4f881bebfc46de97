//! Per-node storage provisioning.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::Error,
    node::{hex, NodeAddr},
    teardown::Teardown,
};

/// Persistent chunk-storage backend, consumed by the harness. Opens one
/// isolated store instance rooted at a caller-supplied location, keyed by a
/// node's protocol address.
pub trait StorageBackend {
    type Store: Send + 'static;

    fn open(&self, dir: &Path, addr: &NodeAddr) -> Result<Self::Store, Error>;
}

/// Allocates one isolated store per address, strictly in order.
///
/// Every temp location created is registered with `teardown` immediately, so
/// on the first failure the teardown releases exactly the locations created
/// so far and the error is surfaced; the stores provisioned before the
/// failure are dropped with the `Err`.
pub fn provision_stores<B: StorageBackend>(
    backend: &B,
    addrs: &[NodeAddr],
    teardown: &mut Teardown,
) -> Result<Vec<B::Store>, Error> {
    let mut stores = Vec::with_capacity(addrs.len());
    for addr in addrs {
        let datadir = tempfile::Builder::new()
            .prefix("streamer-")
            .tempdir()
            .map_err(Error::ResourceAllocation)?
            .keep();
        {
            let datadir = datadir.clone();
            teardown.push(move || {
                let _ = fs::remove_dir_all(&datadir);
            });
        }
        stores.push(backend.open(&datadir, addr)?);
    }
    Ok(stores)
}

/// Minimal directory-rooted chunk store, enough for harness tests. One
/// instance per node, no sharing.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn put(&self, key: &[u8], data: &[u8]) -> Result<(), Error> {
        Ok(fs::write(self.root.join(hex(key)), data)?)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(fs::read(self.root.join(hex(key)))?)
    }
}

/// Backend producing [`DirStore`] instances.
#[derive(Debug, Default)]
pub struct DirBackend;

impl StorageBackend for DirBackend {
    type Store = DirStore;

    fn open(&self, dir: &Path, addr: &NodeAddr) -> Result<Self::Store, Error> {
        let prefix = &addr.key()[..addr.key().len().min(4)];
        let root = dir.join(format!("store-{}", hex(prefix)));
        fs::create_dir_all(&root)?;
        Ok(DirStore { root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    fn addrs(n: usize) -> Vec<NodeAddr> {
        (0..n)
            .map(|_| NodeAddr::from_id(&NodeId::random()))
            .collect()
    }

    struct FailingBackend {
        fail_at: usize,
        seen: std::sync::Mutex<Vec<PathBuf>>,
    }

    impl StorageBackend for FailingBackend {
        type Store = DirStore;

        fn open(&self, dir: &Path, addr: &NodeAddr) -> Result<Self::Store, Error> {
            let mut seen = self.seen.lock().unwrap();
            if seen.len() == self.fail_at {
                return Err(Error::Storage("injected open failure".into()));
            }
            seen.push(dir.to_path_buf());
            DirBackend.open(dir, addr)
        }
    }

    #[test]
    fn provisions_one_store_per_address() {
        let addrs = addrs(3);
        let mut teardown = Teardown::noop();
        let stores = provision_stores(&DirBackend, &addrs, &mut teardown).unwrap();
        assert_eq!(stores.len(), 3);
        assert_eq!(teardown.len(), 3);
        let roots: Vec<_> = stores.iter().map(|s| s.root().to_path_buf()).collect();
        assert!(roots.iter().all(|root| root.is_dir()));
        teardown.run();
        assert!(roots.iter().all(|root| !root.exists()));
    }

    #[test]
    fn partial_failure_cleans_up_exactly_what_was_created() {
        let addrs = addrs(4);
        let backend = FailingBackend {
            fail_at: 2,
            seen: std::sync::Mutex::new(Vec::new()),
        };
        let mut teardown = Teardown::noop();
        let err = provision_stores(&backend, &addrs, &mut teardown).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        // two stores opened, three locations allocated before the failure
        let seen = backend.seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(teardown.len(), 3);
        teardown.run();
        assert!(seen.iter().all(|dir| !dir.exists()));
    }

    #[test]
    fn store_round_trips_chunks() {
        let addrs = addrs(1);
        let mut teardown = Teardown::noop();
        let stores = provision_stores(&DirBackend, &addrs, &mut teardown).unwrap();
        stores[0].put(b"chunk-0", b"payload").unwrap();
        assert_eq!(stores[0].get(b"chunk-0").unwrap(), b"payload");
        teardown.run();
    }
}
