use std::time::UNIX_EPOCH;

/// MTime info gathered for a file.  This also models "file is absent".
/// It's not using an Option<> just because it makes the code using it easier
/// to follow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MTime {
    Missing,
    /// Nanoseconds since the epoch, at whatever resolution the platform
    /// actually records.
    Stamp(u64),
}

/// stat() an on-disk path, producing its MTime.
pub fn stat(path: &str) -> std::io::Result<MTime> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let nanos = meta
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            Ok(MTime::Stamp(nanos))
        }
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                Ok(MTime::Missing)
            } else {
                Err(err)
            }
        }
    }
}
