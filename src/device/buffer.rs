use std::ops::{Deref, DerefMut};

use bevy::prelude::*;

use crate::error::{MpmError, MpmResult};

/// One allocation in the device domain.
///
/// The storage is acquired in the constructor and released when the buffer
/// is dropped; there is no other way to free it.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    label: &'static str,
    data: Box<[T]>,
}

impl<T> DeviceBuffer<T> {
    /// Allocate `len` elements produced by `init`. Allocation failure is
    /// reported instead of aborting.
    pub fn allocate_with(
        label: &'static str,
        len: usize,
        init: impl FnMut() -> T,
    ) -> MpmResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|err| {
            MpmError::Resource(format!(
                "cannot allocate {len} elements for device buffer '{label}': {err}"
            ))
        })?;
        data.resize_with(len, init);
        Ok(Self {
            label,
            data: data.into_boxed_slice(),
        })
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Size of the allocation in bytes.
    pub fn byte_size(&self) -> usize {
        std::mem::size_of_val(&*self.data)
    }
}

impl<T: Clone> DeviceBuffer<T> {
    pub fn filled(label: &'static str, len: usize, value: T) -> MpmResult<Self> {
        Self::allocate_with(label, len, || value.clone())
    }

    /// Host to device copy. Lengths must match.
    pub fn upload(&mut self, source: &[T]) -> MpmResult<()> {
        if source.len() != self.data.len() {
            return Err(MpmError::Resource(format!(
                "upload of {} elements into device buffer '{}' of {}",
                source.len(),
                self.label,
                self.data.len()
            )));
        }
        self.data.clone_from_slice(source);
        Ok(())
    }

    /// Device to host copy. Lengths must match.
    pub fn download(&self, target: &mut [T]) -> MpmResult<()> {
        if target.len() != self.data.len() {
            return Err(MpmError::Resource(format!(
                "download of device buffer '{}' ({} elements) into {}",
                self.label,
                self.data.len(),
                target.len()
            )));
        }
        target.clone_from_slice(&self.data);
        Ok(())
    }
}

impl<T> Deref for DeviceBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for DeviceBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        trace!(
            "Releasing device buffer '{}' ({} bytes)",
            self.label,
            self.byte_size()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_and_download_copy_contents() {
        let mut buffer = DeviceBuffer::filled("test", 3, 0.0f32).unwrap();
        buffer.upload(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(&*buffer, &[1.0, 2.0, 3.0]);

        let mut host = [0.0; 3];
        buffer.download(&mut host).unwrap();
        assert_eq!(host, [1.0, 2.0, 3.0]);
        assert_eq!(buffer.byte_size(), 12);
    }

    #[test]
    fn length_mismatch_is_a_resource_error() {
        let mut buffer = DeviceBuffer::filled("test", 2, 0u8).unwrap();
        assert!(matches!(buffer.upload(&[1, 2, 3]), Err(MpmError::Resource(_))));
    }

    #[test]
    fn oversized_allocation_fails_cleanly() {
        let result = DeviceBuffer::filled("huge", usize::MAX / 2, 0.0f32);
        assert!(matches!(result, Err(MpmError::Resource(_))));
    }
}
