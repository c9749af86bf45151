//! Local-variable slot assignment for one method activation

use crate::ast::DescriptorId;
use crate::common::error::{Error, Result};

use super::jvm_type::JvmType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotOwner {
    Declaration(DescriptorId),
    Temp,
}

#[derive(Debug, Clone, Copy)]
struct FrameSlot {
    owner: SlotOwner,
    index: u16,
    size: u16,
}

/// Slots are densely packed and released strictly in reverse order of entry.
#[derive(Debug, Default, Clone)]
pub struct FrameMap {
    slots: Vec<FrameSlot>,
    next_index: u16,
    max_index: u16,
}

impl FrameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, descriptor: DescriptorId, ty: &JvmType) -> u16 {
        self.push(SlotOwner::Declaration(descriptor), ty.size())
    }

    pub fn leave(&mut self, descriptor: DescriptorId) -> Result<u16> {
        self.pop(SlotOwner::Declaration(descriptor))
    }

    /// Anonymous slot, e.g. `this` or an evaluation temporary
    pub fn enter_temp(&mut self, ty: &JvmType) -> u16 {
        self.push(SlotOwner::Temp, ty.size())
    }

    pub fn leave_temp(&mut self, index: u16) -> Result<()> {
        match self.slots.last() {
            Some(top) if top.owner == SlotOwner::Temp && top.index == index => {
                self.pop(SlotOwner::Temp)?;
                Ok(())
            }
            _ => Err(Error::internal(format!(
                "can only release the most recent entry: temporary slot {} is not on top",
                index
            ))),
        }
    }

    pub fn index_of(&self, descriptor: DescriptorId) -> Option<u16> {
        self.slots
            .iter()
            .rev()
            .find(|slot| slot.owner == SlotOwner::Declaration(descriptor))
            .map(|slot| slot.index)
    }

    /// Next free slot index
    pub fn current_size(&self) -> u16 {
        self.next_index
    }

    /// Highest slot count reached so far
    pub fn max_locals(&self) -> u16 {
        self.max_index
    }

    fn push(&mut self, owner: SlotOwner, size: u16) -> u16 {
        let index = self.next_index;
        self.slots.push(FrameSlot { owner, index, size });
        self.next_index += size;
        self.max_index = self.max_index.max(self.next_index);
        index
    }

    fn pop(&mut self, owner: SlotOwner) -> Result<u16> {
        match self.slots.last() {
            Some(top) if top.owner == owner => {
                let index = top.index;
                self.next_index -= top.size;
                self.slots.pop();
                Ok(index)
            }
            Some(_) => Err(Error::internal(format!(
                "can only release the most recent entry: {:?} is not on top of the frame",
                owner
            ))),
            None => Err(Error::internal(format!("release of {:?} from an empty frame", owner))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_in_reverse_order() {
        let mut frame = FrameMap::new();
        let x = DescriptorId(1);
        let y = DescriptorId(2);
        assert_eq!(frame.enter(x, &JvmType::Int), 0);
        assert_eq!(frame.enter(y, &JvmType::Long), 1);
        assert_eq!(frame.current_size(), 3);

        assert_eq!(frame.leave(y).unwrap(), 1);
        assert_eq!(frame.leave(x).unwrap(), 0);
        assert_eq!(frame.current_size(), 0);
        assert_eq!(frame.max_locals(), 3);
    }

    #[test]
    fn test_release_out_of_order_fails() {
        let mut frame = FrameMap::new();
        let x = DescriptorId(1);
        let y = DescriptorId(2);
        frame.enter(x, &JvmType::Int);
        frame.enter(y, &JvmType::Long);

        let err = frame.leave(x).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("can only release the most recent entry"), "{}", err);
        // the frame is untouched by the failed release
        assert_eq!(frame.index_of(x), Some(0));
        assert_eq!(frame.index_of(y), Some(1));
    }

    #[test]
    fn test_slots_are_reused_after_release() {
        let mut frame = FrameMap::new();
        let this = frame.enter_temp(&JvmType::object("a/B"));
        let d = DescriptorId(7);
        assert_eq!(frame.enter(d, &JvmType::Double), 1);
        frame.leave(d).unwrap();
        assert_eq!(frame.enter(DescriptorId(8), &JvmType::Int), 1);
        assert!(frame.leave_temp(this).is_err());
        assert!(frame.leave_temp(5).is_err());
    }
}
