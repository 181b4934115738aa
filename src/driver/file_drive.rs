use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use tracing::debug;

use crate::driver::{check_sector, DeviceDriver};

/// A disk image file addressed sector by sector.
pub struct FileDrive {
    file: File,
    bytes: u64,
    sector_size: usize,
}

impl FileDrive {
    /// Creates a new zero-filled image. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P, bytes: u64, sector_size: usize) -> io::Result<FileDrive> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        file.set_len(bytes)?;
        debug!(path = %path.as_ref().display(), bytes, "created image");
        Ok(FileDrive { file, bytes, sector_size })
    }

    pub fn open<P: AsRef<Path>>(path: P, sector_size: usize) -> io::Result<FileDrive> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let bytes = file.metadata()?.len();
        Ok(FileDrive { file, bytes, sector_size })
    }
}

impl DeviceDriver for FileDrive {
    fn get_sector_count(&self) -> u64 {
        self.bytes / self.sector_size as u64
    }

    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
        check_sector(self, index, None)?;
        let mut buffer = vec![0; self.sector_size];
        self.file.read_exact_at(&mut buffer, index * self.sector_size as u64)?;
        Ok(buffer)
    }

    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
        check_sector(self, index, Some(data.len()))?;
        self.file.write_all_at(data, index * self.sector_size as u64)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::FileDrive;
    use crate::driver::DeviceDriver;

    #[test]
    fn read_write_sectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.img");
        {
            let mut drive = FileDrive::create(&path, 1024 * 512, 512).unwrap();

            let sector0 = vec![0x42; 512];
            let sector512 = vec![0x8; 512];
            let sector1023 = vec![0x52; 512];

            drive.write_sector(0, &sector0).unwrap();
            drive.write_sector(512, &sector512).unwrap();
            drive.write_sector(1023, &sector1023).unwrap();

            assert_eq!(drive.read_sector(0).unwrap(), sector0);
            assert_eq!(drive.read_sector(512).unwrap(), sector512);
            assert_eq!(drive.read_sector(1023).unwrap(), sector1023);
            assert_eq!(drive.read_sector(2).unwrap(), vec![0; 512]);
            drive.flush().unwrap();
        }

        let drive = FileDrive::open(&path, 512).unwrap();
        assert_eq!(drive.get_sector_count(), 1024);
        assert_eq!(drive.read_sector(512).unwrap(), vec![0x8; 512]);
        assert!(drive.read_sector(1024).is_err());
    }

    #[test]
    fn create_refuses_existing_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.img");
        FileDrive::create(&path, 4096, 512).unwrap();
        assert!(FileDrive::create(&path, 4096, 512).is_err());
    }

    #[test]
    fn sector_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut drive = FileDrive::create(dir.path().join("drive.img"), 4096, 512).unwrap();
        assert!(drive.write_sector(0, &[1, 2, 3]).is_err());
    }
}
