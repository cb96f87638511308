use std::fs;
use std::io;
use std::path::Path;

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("path exists but is not a directory: {}", path.display()),
            ));
        }
        Ok(())
    } else {
        fs::create_dir_all(path)
    }
}
