//! Backing stores: the area heap, its on-disk image, and the table header.

mod area_store;
mod bytes;
mod file;
mod header;
pub mod io_utils;

pub use area_store::{AreaId, AreaStore, HEADER_AREA};
pub use bytes::{ByteReader, ByteWriter};
pub use file::{delete_store, load_store, store_exists, write_store};
pub use header::{TableHeader, TABLE_FORMAT_VERSION};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use tempfile::tempdir;

    #[test]
    fn test_area_allocation_reuses_freed_ids() {
        let mut store = AreaStore::new();
        let a = store.allocate(vec![1, 2, 3]);
        let b = store.allocate(vec![4]);
        assert_ne!(a, HEADER_AREA);
        assert_ne!(a, b);

        store.free(a).unwrap();
        assert!(store.read(a).is_err());
        let c = store.allocate(vec![9]);
        assert_eq!(c, a);
        assert_eq!(store.read(c).unwrap(), &[9]);
        assert_eq!(store.read(b).unwrap(), &[4]);
    }

    #[test]
    fn test_header_area_cannot_be_freed() {
        let mut store = AreaStore::new();
        assert!(matches!(store.free(HEADER_AREA), Err(DbError::Argument(_))));
    }

    #[test]
    fn test_store_image_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.store");

        let mut store = AreaStore::new();
        let a = store.allocate(b"alpha".to_vec());
        let b = store.allocate(b"beta".to_vec());
        store.free(a).unwrap();
        store.write(HEADER_AREA, vec![7; 4]).unwrap();
        write_store(&path, &store).unwrap();

        let loaded = load_store(&path, 0, 0).unwrap();
        assert_eq!(loaded.read(b).unwrap(), b"beta");
        assert_eq!(loaded.read(HEADER_AREA).unwrap(), &[7; 4]);
        assert!(loaded.read(a).is_err());
        assert_eq!(loaded.live_area_count(), store.live_area_count());
    }

    #[test]
    fn test_corrupted_image_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.store");
        let mut store = AreaStore::new();
        store.allocate(b"payload".to_vec());
        write_store(&path, &store).unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xff;
        std::fs::write(&path, raw).unwrap();

        assert!(matches!(
            load_store(&path, 0, 0),
            Err(DbError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_header_codec() {
        let header = TableHeader {
            version: TABLE_FORMAT_VERSION,
            table_id: 12,
            sequence_id: 99,
            last_commit_id: 41,
            schema_area: 1,
            index_info_area: 2,
            index_store_area: 3,
            slot_dir_area: 4,
        };
        let decoded = TableHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_area_ids_skip_header_and_freed_areas() {
        let mut store = AreaStore::new();
        let a = store.allocate(vec![1]);
        let b = store.allocate(vec![2]);
        let c = store.allocate(vec![3]);
        store.free(b).unwrap();
        assert_eq!(store.area_ids().collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut bytes = TableHeader::default().encode();
        bytes[0] ^= 0x55;
        assert!(matches!(
            TableHeader::decode(&bytes),
            Err(DbError::DataCorruption(_))
        ));
    }
}
