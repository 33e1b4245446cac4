// SPDX-License-Identifier: MIT

/// Trait implemented by each layout-specific Meta structure.
/// Provides the static geometry needed during allocation, writing, reading and checking.
pub trait FsMeta {
    /// Size of one allocation unit (erase block) in bytes.
    fn unit_size(&self) -> u32;

    /// Medium address of a given unit.
    fn unit_offset(&self, unit: u32) -> u32;

    /// Total number of allocatable units.
    fn total_units(&self) -> u32;

    /// Payload bytes one unit can carry.
    fn payload_per_unit(&self) -> u32;

    /// Number of scan positions (records or slots) on the medium.
    fn positions(&self) -> u32;

    /// Total size in bytes managed by the layout.
    fn size_bytes(&self) -> u32 {
        self.total_units() * self.unit_size()
    }

    /// Unit holding `address`.
    #[inline]
    fn unit_of(&self, address: u32) -> u32 {
        address / self.unit_size()
    }

    /// Check if a given unit is valid for this layout.
    fn is_valid_unit(&self, unit: u32) -> bool {
        unit < self.total_units()
    }
}
