pub type ModeBits = u32;

const PERMISSIONS_MASK: ModeBits = 0o7777;
const FILE_TYPE_MASK: ModeBits = libc::S_IFMT as ModeBits;

pub trait ModeBitsHelper {
    fn get_permissions(&self) -> u16;
    fn is_directory(&self) -> bool;
    fn is_file(&self) -> bool;
    fn is_symlink(&self) -> bool;
}

impl ModeBitsHelper for ModeBits {
    fn get_permissions(&self) -> u16 {
        (self & PERMISSIONS_MASK) as u16
    }

    fn is_directory(&self) -> bool {
        (self & FILE_TYPE_MASK) == libc::S_IFDIR as ModeBits
    }

    // a bare permission mask (no type bits) counts as a regular file
    fn is_file(&self) -> bool {
        let kind = self & FILE_TYPE_MASK;
        kind == 0 || kind == libc::S_IFREG as ModeBits
    }

    fn is_symlink(&self) -> bool {
        (self & FILE_TYPE_MASK) == libc::S_IFLNK as ModeBits
    }
}

#[cfg(test)]
mod tests {
    use super::{ModeBits, ModeBitsHelper};

    #[test]
    fn mode_bits() {
        let file: ModeBits = libc::S_IFREG as ModeBits | 0o644;
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert_eq!(file.get_permissions(), 0o644);

        let dir: ModeBits = libc::S_IFDIR as ModeBits | 0o755;
        assert!(dir.is_directory());
        assert!(!dir.is_file());

        let bare: ModeBits = 0o600;
        assert!(bare.is_file());
    }
}
