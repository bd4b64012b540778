//! Filesystem infrastructure: implements `LocalFs`.

use std::path::Path;

/// Production filesystem implementation of `LocalFs`.
pub struct HostFs;

impl crate::application::ports::LocalFs for HostFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
