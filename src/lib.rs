pub mod codec;
pub mod database;
pub mod error;
pub mod node;
pub mod state;
pub mod sync;

pub use error::{Error, Result};

/// Data-format version stamped into the store's metadata on first run.
///
/// Bumping it makes every existing store refuse to load, which is the
/// point: old rows are not migrated, they are re-synced.
pub const VERSION: &str = "1";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::state::ChainTip;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fresh_store_initialization() -> Result<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let mut db = Database::new(temp_file.path())?;
        db.initialize(VERSION, "regtest")?;
        assert_eq!(ChainTip::load(&db)?, ChainTip::empty());
        Ok(())
    }
}
