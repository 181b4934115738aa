use crate::consts::{InodePointer, MAX_SYMLINK_LENGTH};
use crate::structure::inode::{Inode, InodeBody};
use crate::util::error::{Error, Result};

const CONDITIONAL_PREFIX: &[u8] = b"root?";
const CONDITIONAL_SEPARATOR: u8 = b':';

pub struct Symlink {
    pub id: InodePointer,
    pub nlink: u32,
    pub target: Vec<u8>,
}

impl Symlink {
    pub fn new(id: InodePointer, target: &[u8]) -> Result<Symlink> {
        validate(target)?;
        Ok(Symlink { id, nlink: 0, target: target.to_vec() })
    }

    pub fn from_inode(inode: Inode) -> Result<Symlink> {
        match inode.body {
            InodeBody::Symlink { target } => Ok(Symlink { id: inode.id, nlink: inode.nlink, target }),
            _ => Err(Error::NotSymlink(inode.id)),
        }
    }

    pub fn to_inode(&self) -> Inode {
        Inode { id: self.id, nlink: self.nlink, body: InodeBody::Symlink { target: self.target.clone() } }
    }

    pub fn resolve(&self, privileged: bool) -> &[u8] {
        resolve(&self.target, privileged)
    }
}

/// Picks the destination a caller sees. `root?A:B` yields `A` for a
/// privileged caller and `B` for everyone else; anything else is literal.
pub fn resolve(payload: &[u8], privileged: bool) -> &[u8] {
    let Some(rest) = payload.strip_prefix(CONDITIONAL_PREFIX) else {
        return payload;
    };
    match rest.iter().position(|&b| b == CONDITIONAL_SEPARATOR) {
        Some(split) if privileged => &rest[..split],
        Some(split) => &rest[split + 1..],
        None => payload,
    }
}

/// Joins the two destinations into the conditional form.
pub fn encode_conditional(root_target: &[u8], other_target: &[u8]) -> Result<Vec<u8>> {
    if root_target.contains(&CONDITIONAL_SEPARATOR) {
        return Err(Error::InvalidArgument("privileged destination may not contain ':'"));
    }
    let mut payload = Vec::with_capacity(CONDITIONAL_PREFIX.len() + root_target.len() + 1 + other_target.len());
    payload.extend_from_slice(CONDITIONAL_PREFIX);
    payload.extend_from_slice(root_target);
    payload.push(CONDITIONAL_SEPARATOR);
    payload.extend_from_slice(other_target);
    validate(&payload)?;
    Ok(payload)
}

pub fn validate(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::InvalidArgument("empty symlink destination"));
    }
    if payload.contains(&0) {
        return Err(Error::InvalidArgument("symlink destination contains NUL"));
    }
    if payload.len() > MAX_SYMLINK_LENGTH {
        return Err(Error::TargetTooLong);
    }
    Ok(())
}
